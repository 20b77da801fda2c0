//! Cache stores backing the core caching behaviors
//!
//! - [`MokaStore`]: bounded in-memory store for [`CacheStoreKind::Session`]
//! - [`FileStore`]: one JSON file per key for [`CacheStoreKind::Durable`]
//!
//! [`CacheStoreKind::Session`]: querykit_domain::CacheStoreKind::Session
//! [`CacheStoreKind::Durable`]: querykit_domain::CacheStoreKind::Durable

pub mod file_store;
pub mod moka_store;

use std::sync::Arc;

pub use file_store::FileStore;
pub use moka_store::MokaStore;
use querykit_core::CacheStore;
use querykit_domain::{CacheSettings, CacheStoreKind, QueryError, QueryResult};

/// Builds the store a cache configuration asks for.
pub fn store_for(settings: &CacheSettings) -> QueryResult<Arc<dyn CacheStore>> {
    match settings.store {
        CacheStoreKind::Session => Ok(Arc::new(MokaStore::new())),
        CacheStoreKind::Durable => {
            let path = settings.durable_path.as_ref().ok_or_else(|| {
                QueryError::Config("durable cache requires cache.durable_path".into())
            })?;
            Ok(Arc::new(FileStore::open(path)?))
        }
    }
}
