//! Queryable: one composable, executable HTTP-like request
//!
//! A `Queryable` is a URL, a query map and a [`Timeline`] of observers. Child
//! queryables share their parent's observer registry until one of them
//! registers something, at which point that instance forks its own copy.
//!
//! Moments run in this order on every invocation:
//!
//! | moment  | combinator   | carries                      |
//! |---------|--------------|------------------------------|
//! | init    | lifecycle    | the instance and its init     |
//! | pre     | async reduce | url, init, partial result     |
//! | auth    | async reduce | url, init                     |
//! | send    | first only   | url, init -> raw response     |
//! | parse   | async reduce | url, raw response, result     |
//! | post    | async reduce | url, result                   |
//!
//! `log`, `error` and `dispose` are broadcasts; `dispose` fires after every
//! execution, successful or not.

pub mod context;
pub mod execution;
pub mod moments;
pub mod ops;
pub mod url;

use querykit_domain::{LogEntry, LogLevel};

pub use context::{Extensions, RequestContext};
pub use execution::Execution;
pub use moments::{
    AuthArgs, AuthFn, InitFn, ParseArgs, ParseFn, PostArgs, PostFn, PreArgs, PreFn, QueryMoments,
    SendFn,
};
pub use url::QueryParams;

use crate::timeline::{Behavior, Observer, ObserverRegistry, Timeline};

/// A URL plus the observers that run when it is invoked.
///
/// Cloning is cheap; observers are shared until one side modifies them.
#[derive(Clone, Debug)]
pub struct Queryable {
    timeline: Timeline<QueryMoments>,
    url: String,
    query: QueryParams,
    extensions: Extensions,
}

impl Queryable {
    /// A root queryable with no observers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            timeline: Timeline::new(),
            url: url.into(),
            query: QueryParams::new(),
            extensions: Extensions::new(),
        }
    }

    /// A queryable at `parent`'s URL plus `path`, sharing its observers and extensions.
    pub fn from_parent(parent: &Self, path: &str) -> Self {
        Self {
            timeline: parent.timeline.clone(),
            url: url::combine(&[&parent.url, path]),
            query: QueryParams::new(),
            extensions: parent.extensions.clone(),
        }
    }

    /// A queryable at exactly `url` that borrows `base`'s observers and extensions.
    pub fn with_base(base: &Self, url: impl Into<String>) -> Self {
        Self {
            timeline: base.timeline.clone(),
            url: url.into(),
            query: QueryParams::new(),
            extensions: base.extensions.clone(),
        }
    }

    /// Shorthand for [`Queryable::from_parent`].
    pub fn child(&self, path: &str) -> Self {
        Self::from_parent(self, path)
    }

    /// Appends `segment` verbatim, without a separating slash or encoding.
    #[must_use]
    pub fn concat(mut self, segment: &str) -> Self {
        self.url.push_str(segment);
        self
    }

    /// Applies a behavior, returning the (possibly forked) instance.
    #[must_use]
    pub fn using<B: Behavior<Self>>(self, behavior: B) -> Self {
        behavior.apply(self)
    }

    /// Path without the query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Owned copy of [`Queryable::url`]; the query string is not included.
    pub fn to_url(&self) -> String {
        self.url.clone()
    }

    /// Path plus the encoded query string.
    pub fn to_request_url(&self) -> String {
        url::append_query(&self.url, &self.query)
    }

    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut QueryParams {
        &mut self.query
    }

    /// Capabilities shared with children, such as a batch registration.
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub const fn timeline(&self) -> &Timeline<QueryMoments> {
        &self.timeline
    }

    /// Registered observers.
    pub fn on(&self) -> &ObserverRegistry<QueryMoments> {
        self.timeline.observers()
    }

    /// Registered observers, forking a shared registry first.
    pub fn on_mut(&mut self) -> &mut ObserverRegistry<QueryMoments> {
        self.timeline.observers_mut()
    }

    /// Whether this instance still shares its registry with `other`.
    pub fn shares_observers_with(&self, other: &Self) -> bool {
        self.timeline.shares_observers_with(&other.timeline)
    }

    /// Emits on the `log` moment.
    pub fn log(&self, message: impl Into<String>, level: LogLevel) {
        self.timeline.emit_log(&LogEntry::new(message, level));
    }

    #[must_use]
    pub fn on_log(mut self, handler: impl Fn(&LogEntry) + Send + Sync + 'static) -> Self {
        self.on_mut().log.append(Observer::log(handler));
        self
    }

    #[must_use]
    pub fn on_error(
        mut self,
        handler: impl Fn(&RequestContext, &querykit_domain::QueryError) + Send + Sync + 'static,
    ) -> Self {
        self.on_mut().error.append(Observer::error(handler));
        self
    }

    #[must_use]
    pub fn on_dispose(mut self, handler: impl Fn(&RequestContext) + Send + Sync + 'static) -> Self {
        self.on_mut().dispose.append(Observer::dispose(handler));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths_compose_and_concat_skips_slash() {
        let root = Queryable::new("https://x.example/sites/dev");
        let web = Queryable::from_parent(&root, "_api/web");
        let list = web.child("lists").concat("('Docs')");
        assert_eq!(web.to_url(), "https://x.example/sites/dev/_api/web");
        assert_eq!(list.to_url(), "https://x.example/sites/dev/_api/web/lists('Docs')");
    }

    #[test]
    fn children_share_registry_until_mutated() {
        let parent = Queryable::new("https://x.example").on_log(|_| {});
        let child = parent.child("a");
        assert!(child.shares_observers_with(&parent));

        let child = child.on_log(|_| {});
        assert!(!child.shares_observers_with(&parent));
        assert_eq!(child.on().log.len(), 2);
        assert_eq!(parent.on().log.len(), 1);
    }

    #[test]
    fn with_base_keeps_url_verbatim() {
        let base = Queryable::new("https://x.example/sites/dev");
        let other = Queryable::with_base(&base, "https://y.example/$batch");
        assert_eq!(other.url(), "https://y.example/$batch");
        assert!(other.shares_observers_with(&base));
    }

    #[test]
    fn query_is_not_inherited_by_children() {
        let mut parent = Queryable::new("https://x.example/items");
        parent.query_mut().set("$top", "5");
        assert_eq!(parent.to_request_url(), "https://x.example/items?%24top=5");
        assert_eq!(parent.child("1").to_request_url(), "https://x.example/items/1");
    }
}
