//! Durable cache: one JSON document per key under a directory

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use querykit_common::time::{Clock, SystemClock};
use querykit_core::{CacheEntry, CacheStore};
use querykit_domain::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::InfraError;

#[derive(Serialize, Deserialize)]
struct Record {
    key: String,
    entry: CacheEntry,
}

/// File-backed store that survives restarts.
///
/// File names are the blake3 hash of the key; writes go to a temporary file
/// that is renamed into place.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("dir", &self.dir).finish_non_exhaustive()
    }
}

fn io_error(error: std::io::Error) -> QueryError {
    InfraError::from(error).into()
}

impl FileStore {
    /// Opens `dir`, creating it when missing.
    pub fn open(dir: impl AsRef<Path>) -> QueryResult<Self> {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    /// Like [`FileStore::open`], judging expiry by `clock`.
    pub fn with_clock(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> QueryResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(io_error)?;
        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", blake3::hash(key.as_bytes()).to_hex()))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> QueryResult<Option<CacheEntry>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e)),
        };
        let record: Record = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        };
        if record.key != key {
            return Ok(None);
        }
        if record.entry.is_expired(self.clock.millis_since_epoch()) {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(record.entry))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> QueryResult<()> {
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        let json = serde_json::to_vec(&Record { key: key.to_string(), entry })
            .map_err(|e| QueryError::Cache(format!("cannot serialize cache entry: {e}")))?;
        fs::write(&staging, json).map_err(io_error)?;
        fs::rename(&staging, &path).map_err(io_error)
    }

    fn remove(&self, key: &str) -> QueryResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(e)),
            _ => Ok(()),
        }
    }
}
