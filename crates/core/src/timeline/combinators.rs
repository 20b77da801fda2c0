//! Moment declarations and the four ways observers of a moment are combined

use std::future::Future;
use std::sync::Arc;

use querykit_domain::QueryResult;

use super::observers::Observer;

/// How the observers of a moment are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Every observer, same arguments, return values ignored
    Broadcast,
    /// Every observer in order, each fed the previous one's output
    AsyncReduce,
    /// Only the first observer; nothing registered resolves to `None`
    Request,
    /// Every observer in order, each allowed to mutate the instance
    Lifecycle,
}

/// A named phase of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub name: &'static str,
    pub combinator: Combinator,
}

impl Moment {
    pub const fn new(name: &'static str, combinator: Combinator) -> Self {
        Self { name, combinator }
    }
}

pub fn broadcast<F: ?Sized>(observers: &[Observer<F>], mut call: impl FnMut(&F)) {
    for observer in observers {
        call(observer.func());
    }
}

/// Threads `seed` through every observer, awaiting each before the next.
///
/// The first error stops the chain.
pub async fn async_reduce<F, A, Fut>(
    observers: Vec<Observer<F>>,
    seed: A,
    mut step: impl FnMut(Arc<F>, A) -> Fut,
) -> QueryResult<A>
where
    F: ?Sized,
    Fut: Future<Output = QueryResult<A>>,
{
    let mut acc = seed;
    for observer in observers {
        acc = step(observer.shared(), acc).await?;
    }
    Ok(acc)
}

pub async fn first_responder<F, T, Fut>(
    observers: &[Observer<F>],
    call: impl FnOnce(Arc<F>) -> Fut,
) -> QueryResult<Option<T>>
where
    F: ?Sized,
    Fut: Future<Output = QueryResult<T>>,
{
    match observers.first() {
        Some(observer) => call(observer.shared()).await.map(Some),
        None => Ok(None),
    }
}

pub fn lifecycle<F, I>(
    observers: &[Observer<F>],
    instance: &mut I,
    mut call: impl FnMut(&F, &mut I) -> QueryResult<()>,
) -> QueryResult<()>
where
    F: ?Sized,
{
    for observer in observers {
        call(observer.func(), instance)?;
    }
    Ok(())
}
