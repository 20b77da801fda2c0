//! The moment set of a [`Queryable`](super::Queryable)

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use querykit_domain::{QueryResult, RawResponse, RequestInit};
use serde_json::Value;

use super::context::RequestContext;
use super::Queryable;
use crate::timeline::{Combinator, Moment, MomentObservers, MomentSet, Observer};

/// Arguments reduced through `pre`.
///
/// Setting `result` short-circuits `auth`, `send` and `parse`.
#[derive(Debug, Clone)]
pub struct PreArgs {
    /// Request URL including the query string.
    pub url: String,
    pub init: RequestInit,
    pub result: Option<Value>,
}

/// Arguments reduced through `auth`.
#[derive(Debug, Clone)]
pub struct AuthArgs {
    pub url: String,
    pub init: RequestInit,
}

/// Arguments reduced through `parse`.
#[derive(Debug, Clone)]
pub struct ParseArgs {
    pub url: String,
    pub response: RawResponse,
    /// Left `None` by every observer, the execution resolves to `null`.
    pub result: Option<Value>,
}

/// Arguments reduced through `post`.
#[derive(Debug, Clone)]
pub struct PostArgs {
    pub url: String,
    pub result: Value,
}

type MomentFuture<T> = BoxFuture<'static, QueryResult<T>>;

/// Synchronous `init` observer; may replace the executing instance's state.
pub type InitFn = dyn Fn(&mut Queryable, &mut RequestInit) -> QueryResult<()> + Send + Sync;
pub type PreFn = dyn Fn(Arc<RequestContext>, PreArgs) -> MomentFuture<PreArgs> + Send + Sync;
pub type AuthFn = dyn Fn(Arc<RequestContext>, AuthArgs) -> MomentFuture<AuthArgs> + Send + Sync;
/// First responder: the first observer whose future resolves wins.
pub type SendFn =
    dyn Fn(Arc<RequestContext>, String, RequestInit) -> MomentFuture<RawResponse> + Send + Sync;
pub type ParseFn = dyn Fn(Arc<RequestContext>, ParseArgs) -> MomentFuture<ParseArgs> + Send + Sync;
pub type PostFn = dyn Fn(Arc<RequestContext>, PostArgs) -> MomentFuture<PostArgs> + Send + Sync;

/// Observers of the request-specific moments, in execution order.
#[derive(Clone, Default)]
pub struct QueryMoments {
    pub init: MomentObservers<InitFn>,
    pub pre: MomentObservers<PreFn>,
    pub auth: MomentObservers<AuthFn>,
    pub send: MomentObservers<SendFn>,
    pub parse: MomentObservers<ParseFn>,
    pub post: MomentObservers<PostFn>,
}

impl MomentSet for QueryMoments {
    type Context = RequestContext;

    const MOMENTS: &'static [Moment] = &[
        Moment::new("init", Combinator::Lifecycle),
        Moment::new("pre", Combinator::AsyncReduce),
        Moment::new("auth", Combinator::AsyncReduce),
        Moment::new("send", Combinator::Request),
        Moment::new("parse", Combinator::AsyncReduce),
        Moment::new("post", Combinator::AsyncReduce),
        Moment::new("log", Combinator::Broadcast),
        Moment::new("error", Combinator::Broadcast),
        Moment::new("dispose", Combinator::Broadcast),
    ];

    fn observer_count(&self) -> usize {
        self.init.len()
            + self.pre.len()
            + self.auth.len()
            + self.send.len()
            + self.parse.len()
            + self.post.len()
    }
}

impl std::fmt::Debug for QueryMoments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryMoments")
            .field("init", &self.init)
            .field("pre", &self.pre)
            .field("auth", &self.auth)
            .field("send", &self.send)
            .field("parse", &self.parse)
            .field("post", &self.post)
            .finish()
    }
}

impl Observer<InitFn> {
    pub fn init(
        f: impl Fn(&mut Queryable, &mut RequestInit) -> QueryResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self::from_arc(Arc::new(f))
    }
}

impl Observer<PreFn> {
    pub fn pre<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>, PreArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult<PreArgs>> + Send + 'static,
    {
        Self::from_arc(Arc::new(move |ctx: Arc<RequestContext>, args: PreArgs| {
            f(ctx, args).boxed()
        }))
    }
}

impl Observer<AuthFn> {
    pub fn auth<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>, AuthArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult<AuthArgs>> + Send + 'static,
    {
        Self::from_arc(Arc::new(move |ctx: Arc<RequestContext>, args: AuthArgs| {
            f(ctx, args).boxed()
        }))
    }
}

impl Observer<SendFn> {
    pub fn send<Fut>(
        f: impl Fn(Arc<RequestContext>, String, RequestInit) -> Fut + Send + Sync + 'static,
    ) -> Self
    where
        Fut: Future<Output = QueryResult<RawResponse>> + Send + 'static,
    {
        Self::from_arc(Arc::new(move |ctx: Arc<RequestContext>, url: String, init: RequestInit| {
            f(ctx, url, init).boxed()
        }))
    }
}

impl Observer<ParseFn> {
    pub fn parse<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>, ParseArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult<ParseArgs>> + Send + 'static,
    {
        Self::from_arc(Arc::new(move |ctx: Arc<RequestContext>, args: ParseArgs| {
            f(ctx, args).boxed()
        }))
    }
}

impl Observer<PostFn> {
    pub fn post<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>, PostArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult<PostArgs>> + Send + 'static,
    {
        Self::from_arc(Arc::new(move |ctx: Arc<RequestContext>, args: PostArgs| {
            f(ctx, args).boxed()
        }))
    }
}
