//! Stock behaviors attached with [`Queryable::using`](crate::Queryable::using)

pub mod headers;
pub mod logging;
pub mod markers;
pub mod parse;

pub use headers::{DefaultHeaders, DefaultInit, InjectHeaders, Telemetry};
pub use logging::TracingLog;
pub use markers::{strip_marker_headers, BatchNever, CacheAlways, CacheNever};
pub use parse::{DefaultParse, JsonHeaderParse, TextParse};
