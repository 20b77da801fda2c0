//! The batch lifecycle and the behavior that binds queryables to it

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::FutureExt;
use parking_lot::Mutex;
use querykit_domain::constants::HEADER_BATCH_NEVER;
use querykit_domain::{LogLevel, QueryError, QueryResult, RawResponse, RequestInit};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use super::codec::{BatchCodec, BatchRequest, BatchSegment};
use crate::queryable::{AuthArgs, Queryable, RequestContext};
use crate::timeline::{Behavior, Observer};

/// Where a batch is in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Accepting registrations.
    Open,
    /// `execute` is running; new registrations fail.
    Executing,
    /// Every registered request has been settled.
    Closed,
}

/// A deferred request, handed over by the bound `send` observer.
struct PendingRequest {
    url: String,
    init: RequestInit,
    respond: oneshot::Sender<QueryResult<RawResponse>>,
    completed: oneshot::Receiver<()>,
}

type Slot = oneshot::Sender<Option<PendingRequest>>;

/// Stored in the executing instance's extensions during `init`.
#[derive(Clone)]
struct BatchTicket {
    batch_id: Uuid,
    index: usize,
    slot: Arc<Mutex<Option<Slot>>>,
}

impl BatchTicket {
    /// Hands over the request, or `None` when the execution never reached `send`.
    /// Only the first call has an effect.
    fn fulfil(&self, request: Option<PendingRequest>) -> bool {
        self.slot.lock().take().is_some_and(|slot| slot.send(request).is_ok())
    }
}

struct Book {
    state: BatchState,
    registered: usize,
    registrations: Vec<oneshot::Receiver<Option<PendingRequest>>>,
}

struct BatchInner {
    id: Uuid,
    base: Queryable,
    codec: Arc<dyn BatchCodec>,
    book: Mutex<Book>,
}

/// Collects bound requests and sends them as one combined request.
#[derive(Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let book = self.inner.book.lock();
        f.debug_struct("Batch")
            .field("id", &self.inner.id)
            .field("url", &self.inner.base.url())
            .field("state", &book.state)
            .field("registered", &book.registered)
            .finish()
    }
}

impl Batch {
    /// Creates an open batch. `base` supplies the pipeline of the combined
    /// request (transport, auth, headers) and the URL the codec builds on.
    pub fn new(base: &Queryable, codec: Arc<dyn BatchCodec>) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                id: Uuid::new_v4(),
                base: base.clone(),
                codec,
                book: Mutex::new(Book {
                    state: BatchState::Open,
                    registered: 0,
                    registrations: Vec::new(),
                }),
            }),
        }
    }

    /// Also used as the multipart boundary suffix.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> BatchState {
        self.inner.book.lock().state
    }

    /// Number of executions registered so far.
    pub fn len(&self) -> usize {
        self.inner.book.lock().registered
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The behavior binding a queryable to this batch.
    pub fn behavior(&self) -> BatchBinding {
        BatchBinding { batch: Arc::downgrade(&self.inner) }
    }

    /// Sends every registered request in one combined request and settles
    /// each caller in registration order.
    ///
    /// A response is only handed to the next request once the previous
    /// execution's result is ready, and this returns once every result is.
    ///
    /// # Errors
    ///
    /// `BatchClosed` when called twice. Encoding, transport and decoding
    /// failures reject every registered request and are returned here too.
    pub async fn execute(&self) -> QueryResult<()> {
        let registrations = {
            let mut book = self.inner.book.lock();
            if book.state != BatchState::Open {
                return Err(QueryError::BatchClosed(format!(
                    "batch {} is {:?}",
                    self.inner.id, book.state
                )));
            }
            book.state = BatchState::Executing;
            std::mem::take(&mut book.registrations)
        };
        debug!(batch_id = %self.inner.id, registered = registrations.len(), "executing batch");

        let mut pending = Vec::with_capacity(registrations.len());
        for registration in registrations {
            if let Ok(Some(request)) = registration.await {
                pending.push(request);
            }
        }

        let outcome = self.inner.dispatch(pending).await;
        self.inner.book.lock().state = BatchState::Closed;
        outcome
    }
}

impl BatchInner {
    fn register(&self, instance: &mut Queryable, init: &RequestInit) -> QueryResult<()> {
        if init.headers.contains(HEADER_BATCH_NEVER) {
            return Ok(());
        }
        if let Some(ticket) = instance.extensions().get::<BatchTicket>() {
            return Err(QueryError::AlreadyBatched(ticket.batch_id.to_string()));
        }

        let (slot, registration) = oneshot::channel();
        let index = {
            let mut book = self.book.lock();
            if book.state != BatchState::Open {
                return Err(QueryError::BatchClosed(format!(
                    "batch {} is {:?}",
                    self.id, book.state
                )));
            }
            book.registrations.push(registration);
            book.registered += 1;
            book.registered
        };
        instance.log(
            format!("Registered as request {index} of batch {}", self.id),
            LogLevel::Verbose,
        );
        instance.extensions_mut().insert(BatchTicket {
            batch_id: self.id,
            index,
            slot: Arc::new(Mutex::new(Some(slot))),
        });
        Ok(())
    }

    async fn dispatch(&self, pending: Vec<PendingRequest>) -> QueryResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let requests: Vec<BatchRequest> = pending
            .iter()
            .enumerate()
            .map(|(i, request)| BatchRequest {
                id: (i + 1).to_string(),
                url: request.url.clone(),
                init: request.init.clone(),
            })
            .collect();

        let segments = match self.transmit(&requests).await {
            Ok(segments) => segments,
            Err(error) => {
                warn!(batch_id = %self.id, %error, "batch request failed");
                for request in pending {
                    let _ = request.respond.send(Err(error.clone()));
                    let _ = request.completed.await;
                }
                return Err(error);
            }
        };

        let mut results: HashMap<String, QueryResult<RawResponse>> =
            segments.into_iter().map(|segment| (segment.id, segment.result)).collect();
        for (request, waiting) in requests.iter().zip(pending) {
            let result = results.remove(&request.id).unwrap_or_else(|| {
                Err(QueryError::Batch(format!("no response for batched request {}", request.id)))
            });
            let _ = waiting.respond.send(result);
            let _ = waiting.completed.await;
        }
        Ok(())
    }

    async fn transmit(&self, requests: &[BatchRequest]) -> QueryResult<Vec<BatchSegment>> {
        let base_url = self.base.url();
        let init = self.codec.encode(&self.id.to_string(), base_url, requests)?;

        let mut carrier = Queryable::with_base(&self.base, self.codec.endpoint(base_url));
        {
            let registry = carrier.on_mut();
            registry.parse.replace(Observer::parse(|_, mut args| async move {
                args.result = Some(serde_json::to_value(&args.response)?);
                Ok(args)
            }));
            registry.post.clear();
        }

        let value = carrier.invoke_with(init).await?;
        let response: RawResponse = serde_json::from_value(value)?;
        if !response.is_success() {
            return Err(QueryError::http(response.status, response.status_text, response.body));
        }
        self.codec.decode(&response, requests)
    }

    async fn enqueue(
        batch: Weak<Self>,
        ctx: &RequestContext,
        url: String,
        init: RequestInit,
    ) -> QueryResult<RawResponse> {
        let ticket = ctx
            .instance()
            .extensions()
            .get::<BatchTicket>()
            .cloned()
            .ok_or_else(|| QueryError::Internal("batched send without a registration".into()))?;
        let batch_id = batch.upgrade().map(|inner| inner.id);
        if batch_id != Some(ticket.batch_id) {
            return Err(QueryError::BatchClosed(format!("batch {} was dropped", ticket.batch_id)));
        }

        let (respond, response) = oneshot::channel();
        let (done, completed) = oneshot::channel();
        ctx.on_finished(move || {
            let _ = done.send(());
        });
        ctx.log(
            format!(
                "Deferred {} {url} as request {} of batch {}",
                init.method, ticket.index, ticket.batch_id
            ),
            LogLevel::Verbose,
        );
        if !ticket.fulfil(Some(PendingRequest { url, init, respond, completed })) {
            return Err(QueryError::BatchClosed(format!("batch {} was dropped", ticket.batch_id)));
        }

        response.await.map_err(|_| {
            QueryError::Batch(format!("batch {} dropped before responding", ticket.batch_id))
        })?
    }
}

/// Binds a queryable to a [`Batch`]; see [`Batch::behavior`].
///
/// Registration happens in `init` and the binding replaces `send`, so apply it
/// after the transport. `auth` observers registered before binding only run for
/// requests marked `BatchNever`; the combined request is authenticated once.
#[derive(Clone)]
pub struct BatchBinding {
    batch: Weak<BatchInner>,
}

impl fmt::Debug for BatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchBinding")
            .field("batch", &self.batch.upgrade().map(|inner| inner.id))
            .finish()
    }
}

impl Behavior<Queryable> for BatchBinding {
    fn apply(self, mut target: Queryable) -> Queryable {
        let registry = target.on_mut();
        let original_send = registry.send.first().cloned();

        let batch = self.batch.clone();
        registry.init.append(Observer::init(move |instance, init| match batch.upgrade() {
            Some(inner) => inner.register(instance, init),
            None if init.headers.contains(HEADER_BATCH_NEVER) => Ok(()),
            None => Err(QueryError::BatchClosed("batch was dropped".into())),
        }));

        for observer in registry.auth.clear() {
            registry.auth.append(Observer::auth(move |ctx, args: AuthArgs| {
                if args.init.headers.contains(HEADER_BATCH_NEVER) {
                    (observer.func())(ctx, args)
                } else {
                    async move { Ok(args) }.boxed()
                }
            }));
        }

        let batch = self.batch.clone();
        registry.send.replace(Observer::send(move |ctx, url, init| {
            let batch = batch.clone();
            let original = original_send.clone();
            async move {
                if init.headers.contains(HEADER_BATCH_NEVER) {
                    return match original {
                        Some(send) => (send.func())(ctx, url, init).await,
                        None => Err(QueryError::Config(format!(
                            "no transport to send {url} outside the batch"
                        ))),
                    };
                }
                BatchInner::enqueue(batch, &ctx, url, init).await
            }
        }));

        let batch_id = self.batch.upgrade().map(|inner| inner.id);
        registry.dispose.append(Observer::dispose(move |ctx: &RequestContext| {
            let ticket = ctx.instance().extensions().get::<BatchTicket>().cloned();
            if let Some(ticket) = ticket.filter(|ticket| Some(ticket.batch_id) == batch_id) {
                ctx.on_finished(move || {
                    ticket.fulfil(None);
                });
            }
        }));

        target
    }
}

impl Queryable {
    /// Creates a batch on this queryable's pipeline and returns a copy bound to it.
    pub fn batched(&self, codec: Arc<dyn BatchCodec>) -> (Self, Batch) {
        let batch = Batch::new(self, codec);
        let bound = self.clone().using(batch.behavior());
        (bound, batch)
    }
}
