//! Header and init defaults

use querykit_domain::constants::{
    HEADER_ACCEPT, HEADER_CACHE_CONTROL, HEADER_CLIENT_TAG, HEADER_CONTENT_TYPE,
};
use querykit_domain::Headers;

use crate::queryable::Queryable;
use crate::timeline::{Behavior, Observer};

/// Adds `Cache-Control: no-cache` unless the caller set one.
///
/// The method already defaults to `GET` through `RequestInit::default`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInit;

impl Behavior<Queryable> for DefaultInit {
    fn apply(self, mut target: Queryable) -> Queryable {
        target.on_mut().pre.append(Observer::pre(|_, mut args| async move {
            args.init.headers.set_if_absent(HEADER_CACHE_CONTROL, "no-cache");
            Ok(args)
        }));
        target
    }
}

/// Default `Accept`/`Content-Type` pairs. Headers already on the request win.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: Headers,
}

impl DefaultHeaders {
    pub fn new(headers: Headers) -> Self {
        Self { headers }
    }

    /// Document API: minimal-metadata JSON.
    pub fn document() -> Self {
        Self::new(
            [
                (HEADER_ACCEPT, "application/json;odata=nometadata"),
                (HEADER_CONTENT_TYPE, "application/json;charset=utf-8"),
            ]
            .into_iter()
            .collect(),
        )
    }

    pub fn graph() -> Self {
        Self::new(
            [(HEADER_ACCEPT, "application/json"), (HEADER_CONTENT_TYPE, "application/json")]
                .into_iter()
                .collect(),
        )
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }
}

impl Behavior<Queryable> for DefaultHeaders {
    fn apply(self, mut target: Queryable) -> Queryable {
        let defaults = self.headers;
        target.on_mut().pre.append(Observer::pre(move |_, mut args| {
            for (name, value) in defaults.iter() {
                args.init.headers.set_if_absent(name, value);
            }
            async move { Ok(args) }
        }));
        target
    }
}

/// Sets headers unconditionally in `pre`.
#[derive(Debug, Clone, Default)]
pub struct InjectHeaders {
    headers: Headers,
    prepend: bool,
}

impl InjectHeaders {
    pub fn new(headers: Headers) -> Self {
        Self { headers, prepend: false }
    }

    /// Runs ahead of every `pre` observer registered so far.
    #[must_use]
    pub const fn prepend(mut self, prepend: bool) -> Self {
        self.prepend = prepend;
        self
    }
}

impl Behavior<Queryable> for InjectHeaders {
    fn apply(self, mut target: Queryable) -> Queryable {
        let headers = self.headers;
        let observer = Observer::pre(move |_, mut args| {
            args.init.headers.merge(&headers);
            async move { Ok(args) }
        });
        let pre = &mut target.on_mut().pre;
        if self.prepend {
            pre.prepend(observer);
        } else {
            pre.append(observer);
        }
        target
    }
}

/// Tags every request with the client identifier header.
#[derive(Debug, Clone)]
pub struct Telemetry {
    client_tag: String,
}

impl Telemetry {
    pub fn new(client_tag: impl Into<String>) -> Self {
        Self { client_tag: client_tag.into() }
    }
}

impl Behavior<Queryable> for Telemetry {
    fn apply(self, target: Queryable) -> Queryable {
        let headers: Headers = [(HEADER_CLIENT_TAG, self.client_tag)].into_iter().collect();
        InjectHeaders::new(headers).apply(target)
    }
}
