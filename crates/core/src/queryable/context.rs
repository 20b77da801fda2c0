//! Per-instance extensions and per-execution context

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use querykit_domain::{LogEntry, LogLevel, RequestInit};
use uuid::Uuid;

use super::Queryable;

/// Type-keyed capability table.
///
/// Values are shared between clones; replace a value to change it for one instance.
#[derive(Clone, Default)]
pub struct Extensions {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<Arc<T>> {
        self.values
            .insert(TypeId::of::<T>(), Arc::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// The value stored for type `T`, if any.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>()).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.values.remove(&TypeId::of::<T>()).and_then(|value| value.downcast::<T>().ok())
    }

    /// Removes and unwraps a value no clone still shares.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.remove::<T>().and_then(|value| Arc::try_unwrap(value).ok())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").field("len", &self.values.len()).finish()
    }
}

type Finisher = Box<dyn FnOnce() + Send>;

/// One execution of a queryable.
///
/// Shared by every observer of the execution. `state` is scratch space for
/// behaviors that need to carry something from one moment to a later one.
pub struct RequestContext {
    id: Uuid,
    origin: Queryable,
    instance: Queryable,
    init: RequestInit,
    state: Mutex<Extensions>,
    finishers: Mutex<Vec<Finisher>>,
}

impl RequestContext {
    pub(crate) fn new(origin: Queryable, instance: Queryable, init: RequestInit) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            instance,
            init,
            state: Mutex::new(Extensions::new()),
            finishers: Mutex::new(Vec::new()),
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The instance as invoked, before `init` observers ran.
    pub const fn origin(&self) -> &Queryable {
        &self.origin
    }

    /// The instance after `init`, whose observers drive this execution.
    pub const fn instance(&self) -> &Queryable {
        &self.instance
    }

    /// Request init as it entered `pre`.
    pub const fn init(&self) -> &RequestInit {
        &self.init
    }

    /// Execution-scoped scratch state. Do not hold the guard across an await.
    pub fn state(&self) -> MutexGuard<'_, Extensions> {
        self.state.lock()
    }

    /// Runs `f` once the execution's result can be taken from its [`Execution`],
    /// after `error` and `dispose`. Registering from a `dispose` observer works.
    ///
    /// [`Execution`]: super::Execution
    pub fn on_finished(&self, f: impl FnOnce() + Send + 'static) {
        self.finishers.lock().push(Box::new(f));
    }

    pub(crate) fn finish(&self) {
        let finishers = std::mem::take(&mut *self.finishers.lock());
        for finisher in finishers {
            finisher();
        }
    }

    /// Emits on the `log` moment, prefixed with the execution id.
    pub fn log(&self, message: impl AsRef<str>, level: LogLevel) {
        let entry = LogEntry::new(format!("[{}] {}", self.id, message.as_ref()), level);
        self.instance.timeline().emit_log(&entry);
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("url", &self.instance.to_request_url())
            .field("method", &self.init.method)
            .finish_non_exhaustive()
    }
}
