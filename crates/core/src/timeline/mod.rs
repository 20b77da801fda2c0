//! Timeline engine
//!
//! A timeline is a fixed, ordered set of moments plus a per-instance observer
//! registry. Cloning a timeline shares the registry; the first mutation through
//! [`Timeline::observers_mut`] forks a private copy, so a clone never leaks
//! registrations back into its source.

pub mod behavior;
pub mod combinators;
pub mod observers;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use querykit_domain::{LogEntry, QueryError};
use tracing::trace;

pub use behavior::Behavior;
pub use combinators::{async_reduce, broadcast, first_responder, lifecycle, Combinator, Moment};
pub use observers::{MomentObservers, Observer, ObserverId};

/// Observer of the `log` moment.
pub type LogFn = dyn Fn(&LogEntry) + Send + Sync;
/// Observer of the `error` moment.
pub type ErrorFn<C> = dyn Fn(&C, &QueryError) + Send + Sync;
/// Observer of the `dispose` moment.
pub type DisposeFn<C> = dyn Fn(&C) + Send + Sync;

/// The moments particular to one timeline type.
///
/// `log`, `error` and `dispose` are common to every timeline and live on
/// [`ObserverRegistry`] itself.
pub trait MomentSet: Clone + Default + Send + Sync + 'static {
    /// Per-execution value handed to `error` and `dispose` observers
    type Context: Send + Sync + 'static;

    /// Every moment of the timeline, in execution order.
    const MOMENTS: &'static [Moment];

    fn observer_count(&self) -> usize;
}

/// All observers of one timeline instance.
pub struct ObserverRegistry<M: MomentSet> {
    pub log: MomentObservers<LogFn>,
    pub error: MomentObservers<ErrorFn<M::Context>>,
    pub dispose: MomentObservers<DisposeFn<M::Context>>,
    pub moments: M,
}

impl<M: MomentSet> Default for ObserverRegistry<M> {
    fn default() -> Self {
        Self {
            log: MomentObservers::default(),
            error: MomentObservers::default(),
            dispose: MomentObservers::default(),
            moments: M::default(),
        }
    }
}

impl<M: MomentSet> Clone for ObserverRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            error: self.error.clone(),
            dispose: self.dispose.clone(),
            moments: self.moments.clone(),
        }
    }
}

impl<M: MomentSet> Deref for ObserverRegistry<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.moments
    }
}

impl<M: MomentSet> DerefMut for ObserverRegistry<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.moments
    }
}

impl<M: MomentSet> ObserverRegistry<M> {
    pub fn observer_count(&self) -> usize {
        self.log.len() + self.error.len() + self.dispose.len() + self.moments.observer_count()
    }
}

impl Observer<LogFn> {
    pub fn log(f: impl Fn(&LogEntry) + Send + Sync + 'static) -> Self {
        Self::from_arc(Arc::new(f))
    }
}

impl<C: 'static> Observer<ErrorFn<C>> {
    pub fn error(f: impl Fn(&C, &QueryError) + Send + Sync + 'static) -> Self {
        Self::from_arc(Arc::new(f))
    }
}

impl<C: 'static> Observer<DisposeFn<C>> {
    pub fn dispose(f: impl Fn(&C) + Send + Sync + 'static) -> Self {
        Self::from_arc(Arc::new(f))
    }
}

/// Observer registry handle with copy-on-write sharing.
pub struct Timeline<M: MomentSet> {
    registry: Arc<ObserverRegistry<M>>,
}

impl<M: MomentSet> Clone for Timeline<M> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry) }
    }
}

impl<M: MomentSet> Default for Timeline<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MomentSet> std::fmt::Debug for Timeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("observers", &self.registry.observer_count())
            .field("shared", &(Arc::strong_count(&self.registry) > 1))
            .finish()
    }
}

impl<M: MomentSet> Timeline<M> {
    pub fn new() -> Self {
        Self { registry: Arc::new(ObserverRegistry::default()) }
    }

    pub const fn moments() -> &'static [Moment] {
        M::MOMENTS
    }

    pub fn observers(&self) -> &ObserverRegistry<M> {
        &self.registry
    }

    /// Mutable access, forking the registry first when it is shared.
    pub fn observers_mut(&mut self) -> &mut ObserverRegistry<M> {
        if Arc::strong_count(&self.registry) > 1 {
            trace!("forking shared observer registry");
        }
        Arc::make_mut(&mut self.registry)
    }

    /// Whether both timelines still point at the same registry.
    pub fn shares_observers_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }

    pub fn emit_log(&self, entry: &LogEntry) {
        broadcast(self.registry.log.as_slice(), |f| f(entry));
    }

    pub fn emit_error(&self, context: &M::Context, error: &QueryError) {
        broadcast(self.registry.error.as_slice(), |f| f(context, error));
    }

    pub fn emit_dispose(&self, context: &M::Context) {
        broadcast(self.registry.dispose.as_slice(), |f| f(context));
    }
}
