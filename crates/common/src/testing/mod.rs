//! Helpers for async tests across the workspace

pub mod async_utils;

pub use async_utils::{poll_until, timeout_ok};
pub use crate::time::MockClock;
