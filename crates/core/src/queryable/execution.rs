//! Invocation and the moment pipeline

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use querykit_domain::{LogLevel, QueryError, QueryResult, RequestInit};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use super::context::RequestContext;
use super::moments::{AuthArgs, ParseArgs, PostArgs, PreArgs};
use super::Queryable;
use crate::timeline::{async_reduce, first_responder, lifecycle};

/// A started execution. Resolves to the value produced by `post`.
///
/// The result becomes available after `error` and `dispose` have been emitted.
/// Dropping it does not cancel the execution.
#[must_use = "an execution only reports its result when awaited"]
#[derive(Debug)]
pub struct Execution {
    id: Option<Uuid>,
    state: ExecutionState,
}

#[derive(Debug)]
enum ExecutionState {
    Running { task: JoinHandle<()>, result: oneshot::Receiver<QueryResult<Value>> },
    Settled(Option<QueryResult<Value>>),
}

impl Execution {
    pub(crate) fn rejected(error: QueryError) -> Self {
        Self { id: None, state: ExecutionState::Settled(Some(Err(error))) }
    }

    /// Id of the execution's context, absent when it failed before starting.
    pub const fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            ExecutionState::Running { task, .. } => task.is_finished(),
            ExecutionState::Settled(_) => true,
        }
    }

    /// Awaits the result and deserializes it.
    pub async fn json<T: DeserializeOwned>(self) -> QueryResult<T> {
        let value = self.await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl Future for Execution {
    type Output = QueryResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            ExecutionState::Running { result, .. } => match Pin::new(result).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(QueryError::Internal(
                    "execution aborted before producing a result".into(),
                ))),
                Poll::Pending => Poll::Pending,
            },
            ExecutionState::Settled(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(QueryError::Internal("execution polled after completion".into()))
            })),
        }
    }
}

impl Queryable {
    /// Starts an execution with a default `GET` init.
    pub fn invoke(&self) -> Execution {
        self.invoke_with(RequestInit::default())
    }

    /// Starts an execution with `init`.
    ///
    /// `init` observers run before this returns; everything from `pre` on runs
    /// on a spawned task, so configuration after this call cannot affect it.
    /// Requires a tokio runtime.
    pub fn invoke_with(&self, init: RequestInit) -> Execution {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Execution::rejected(QueryError::Config(
                "queryable invoked outside of a tokio runtime".into(),
            ));
        };

        let origin = self.clone();
        let mut instance = self.clone();
        let mut init = init;

        let init_observers = instance.on().init.to_vec();
        let started = lifecycle(&init_observers, &mut instance, |f, q| f(q, &mut init))
            .and_then(|()| {
                if instance.on().send.is_empty() {
                    Err(QueryError::Config(format!(
                        "no send observer registered for {}; attach a transport behavior",
                        instance.to_request_url()
                    )))
                } else {
                    Ok(())
                }
            });

        let ctx = Arc::new(RequestContext::new(origin, instance, init));
        if let Err(error) = started {
            debug!(request_id = %ctx.id(), error = %error, "execution rejected before start");
            settle(&ctx, &Err(error.clone()));
            ctx.finish();
            return Execution::rejected(error);
        }

        let id = ctx.id();
        let (deliver, result) = oneshot::channel();
        let task = runtime.spawn(async move {
            let outcome = run(&ctx).await;
            settle(&ctx, &outcome);
            let _ = deliver.send(outcome);
            ctx.finish();
        });

        Execution { id: Some(id), state: ExecutionState::Running { task, result } }
    }
}

fn settle(ctx: &RequestContext, outcome: &QueryResult<Value>) {
    let timeline = ctx.instance().timeline();
    if let Err(error) = outcome {
        ctx.log(format!("Execution failed: {error}"), LogLevel::Error);
        timeline.emit_error(ctx, error);
    }
    timeline.emit_dispose(ctx);
}

async fn run(ctx: &Arc<RequestContext>) -> QueryResult<Value> {
    let moments = ctx.instance().on();
    let url = ctx.instance().to_request_url();
    let init = ctx.init().clone();

    ctx.log(format!("Beginning {} request ({url})", init.method), LogLevel::Info);

    let PreArgs { url, init, result } =
        async_reduce(moments.pre.to_vec(), PreArgs { url, init, result: None }, |f, args| {
            f(Arc::clone(ctx), args)
        })
        .await?;

    let (url, value) = match result {
        Some(value) => {
            ctx.log("Result provided by pre, skipping send", LogLevel::Verbose);
            (url, value)
        }
        None => {
            let AuthArgs { url, init } =
                async_reduce(moments.auth.to_vec(), AuthArgs { url, init }, |f, args| {
                    f(Arc::clone(ctx), args)
                })
                .await?;

            let response =
                first_responder(moments.send.as_slice(), |f| f(Arc::clone(ctx), url.clone(), init))
                    .await?
                    .ok_or_else(|| {
                        QueryError::Config("send observer removed during execution".into())
                    })?;

            let parsed = async_reduce(
                moments.parse.to_vec(),
                ParseArgs { url, response, result: None },
                |f, args| f(Arc::clone(ctx), args),
            )
            .await?;
            (parsed.url, parsed.result.unwrap_or(Value::Null))
        }
    };

    let post = async_reduce(moments.post.to_vec(), PostArgs { url, result: value }, |f, args| {
        f(Arc::clone(ctx), args)
    })
    .await?;

    ctx.log("Emitting result", LogLevel::Verbose);
    Ok(post.result)
}
