//! Composable registration units

/// Something that registers observers on a timeline instance.
///
/// Applied through `using`. Implementations only register; they must not do I/O.
pub trait Behavior<T> {
    fn apply(self, target: T) -> T;
}

impl<T, F> Behavior<T> for F
where
    F: FnOnce(T) -> T,
{
    fn apply(self, target: T) -> T {
        self(target)
    }
}
