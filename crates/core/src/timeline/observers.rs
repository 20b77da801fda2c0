//! Observer registry primitives
//!
//! An [`Observer`] is one callback bound to one moment. [`MomentObservers`] is
//! the ordered list kept per moment.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a registered observer.
///
/// Survives clones of the observer and forks of the registry, so a behavior can
/// find and remove exactly the callback it registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// A callback registered on a moment.
pub struct Observer<F: ?Sized> {
    id: ObserverId,
    func: Arc<F>,
}

impl<F: ?Sized> Observer<F> {
    pub fn from_arc(func: Arc<F>) -> Self {
        Self::with_id(ObserverId::next(), func)
    }

    /// Builds an observer under an id reserved beforehand with [`ObserverId::next`].
    pub const fn with_id(id: ObserverId, func: Arc<F>) -> Self {
        Self { id, func }
    }

    pub const fn id(&self) -> ObserverId {
        self.id
    }

    pub fn func(&self) -> &F {
        &self.func
    }

    pub fn shared(&self) -> Arc<F> {
        Arc::clone(&self.func)
    }
}

impl<F: ?Sized> Clone for Observer<F> {
    fn clone(&self) -> Self {
        Self { id: self.id, func: Arc::clone(&self.func) }
    }
}

impl<F: ?Sized> fmt::Debug for Observer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observer").field(&self.id).finish()
    }
}

/// Ordered observers of a single moment.
pub struct MomentObservers<F: ?Sized> {
    observers: Vec<Observer<F>>,
}

impl<F: ?Sized> Default for MomentObservers<F> {
    fn default() -> Self {
        Self { observers: Vec::new() }
    }
}

impl<F: ?Sized> Clone for MomentObservers<F> {
    fn clone(&self) -> Self {
        Self { observers: self.observers.clone() }
    }
}

impl<F: ?Sized> fmt::Debug for MomentObservers<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.observers.iter().map(Observer::id)).finish()
    }
}

impl<F: ?Sized> MomentObservers<F> {
    /// Adds `observer` last. No duplicate suppression.
    pub fn append(&mut self, observer: Observer<F>) -> ObserverId {
        let id = observer.id();
        self.observers.push(observer);
        id
    }

    pub fn prepend(&mut self, observer: Observer<F>) -> ObserverId {
        let id = observer.id();
        self.observers.insert(0, observer);
        id
    }

    /// Makes `observer` the only one registered.
    pub fn replace(&mut self, observer: Observer<F>) -> ObserverId {
        self.observers.clear();
        self.append(observer)
    }

    /// Empties the list, handing back what was registered so a filtered subset can be re-added.
    pub fn clear(&mut self) -> Vec<Observer<F>> {
        std::mem::take(&mut self.observers)
    }

    /// Removes the observer with `id`. Returns whether one was found.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|observer| observer.id() != id);
        before != self.observers.len()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Observer<F>) -> bool) {
        self.observers.retain(|observer| keep(observer));
    }

    /// Snapshot in registration order.
    pub fn to_vec(&self) -> Vec<Observer<F>> {
        self.observers.clone()
    }

    pub fn ids(&self) -> Vec<ObserverId> {
        self.observers.iter().map(Observer::id).collect()
    }

    pub fn as_slice(&self) -> &[Observer<F>] {
        &self.observers
    }

    pub fn first(&self) -> Option<&Observer<F>> {
        self.observers.first()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
