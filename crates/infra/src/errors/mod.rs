//! Error conversions from infrastructure crates

mod conversions;

pub use conversions::InfraError;
