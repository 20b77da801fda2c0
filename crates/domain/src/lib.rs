//! # QueryKit Domain
//!
//! Plain data shared by every QueryKit crate.
//!
//! This crate contains:
//! - The error taxonomy ([`QueryError`]) and [`QueryResult`] alias
//! - Request and response shapes ([`RequestInit`], [`RawResponse`], [`Headers`])
//! - Log entries emitted through the `log` moment
//! - Client configuration structures
//!
//! ## Architecture
//! - No dependencies on other QueryKit crates
//! - Only external dependencies allowed
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
