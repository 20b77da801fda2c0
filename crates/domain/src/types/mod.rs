//! Request and response data

pub mod headers;
pub mod log;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use log::{LogEntry, LogLevel};
pub use request::{HttpMethod, RequestInit};
pub use response::RawResponse;
