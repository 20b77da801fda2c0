//! # QueryKit Infrastructure
//!
//! Implementations of the ports defined in `querykit-core`.
//!
//! This crate contains:
//! - The reqwest transport with retry and `Retry-After` support
//! - Multipart and JSON `$batch` codecs
//! - The `contextinfo` request digest source
//! - Moka and file-backed cache stores
//! - Configuration loading and tracing setup
//! - Presets that assemble root queryables from a [`querykit_domain::ClientConfig`]
//!
//! ## Architecture
//! - Implements traits defined in `querykit-core`
//! - Contains all "impure" code (network, file system, environment)

pub mod batching;
pub mod cache;
pub mod config;
pub mod digest;
pub mod errors;
pub mod http;
pub mod presets;
pub mod telemetry;

// Re-export commonly used items
pub use batching::{JsonBatchCodec, MultipartBatchCodec};
pub use cache::{FileStore, MokaStore};
pub use digest::ContextInfoDigestSource;
pub use errors::InfraError;
pub use http::{Fetch, FetchWithRetry, HttpClient, HttpClientBuilder};
pub use presets::{document_batch, document_root, graph_batch, graph_root, root_for};
pub use telemetry::init_tracing;
