//! Key-value persistence backends.
//!
//! Every domain store in this crate talks to storage through
//! [`KeyValueStore`]. Two implementations ship:
//!
//! - [`LmdbStore`]: the production backend. LMDB environments can be opened by
//!   several processes at once, so the host app and its widget extension can
//!   point at the same directory.
//! - [`MemoryStore`]: an ordered in-memory map for tests and for the
//!   in-memory-only fallback after the real backend fails to open.
//!
//! Each `put` is a single committed transaction, so a value is always replaced
//! as a whole and readers see either the previous or the new bytes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};

const DEFAULT_DB_NAME: &str = "wordsearch";
const DEFAULT_MAP_SIZE_MB: usize = 16;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()>;

    /// Returns `true` when a value was present and removed.
    fn delete(&self, key: &str) -> EngineResult<bool>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>>;

    /// Forces buffered state to durable storage. Commits are already durable
    /// for LMDB; this is for callers about to hand the files to another
    /// process.
    fn flush(&self) -> EngineResult<()> {
        Ok(())
    }
}

pub struct LmdbStore {
    env: Environment,
    db: Database,
}

impl LmdbStore {
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE_MB)
    }

    pub fn open_with_map_size(path: impl AsRef<Path>, map_size_mb: usize) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        info!("Opening LMDB environment at: {}", path.display());

        let env = Environment::new()
            .set_max_dbs(4)
            .set_map_size(map_size_mb.max(1) * 1024 * 1024)
            .open(&path)
            .map_err(|e| {
                warn!("Failed to open LMDB environment at {}: {e}", path.display());
                EngineError::from(e)
            })?;
        let db = env.create_db(Some(DEFAULT_DB_NAME), DatabaseFlags::empty())?;

        Ok(Self { env, db })
    }
}

impl KeyValueStore for LmdbStore {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let txn = self.env.begin_ro_txn()?;
        match txn.get(self.db, &key) {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Committed {} bytes under '{key}'", value.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<bool> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) => {
                txn.commit()?;
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.db)?;
        let mut entries = Vec::new();

        for (key, value) in cursor.iter_start() {
            if !key.starts_with(prefix.as_bytes()) {
                continue;
            }
            match std::str::from_utf8(key) {
                Ok(k) => entries.push((k.to_string(), value.to_vec())),
                Err(e) => warn!("Skipping non UTF-8 key in LMDB: {e}"),
            }
        }

        Ok(entries)
    }

    fn flush(&self) -> EngineResult<()> {
        self.env.sync(true)?;
        Ok(())
    }
}

/// In-memory backend. `set_available(false)` makes every call fail with
/// [`EngineError::PersistenceUnavailable`], which is how tests exercise the
/// degraded paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes raw bytes without any envelope, for seeding corrupted data.
    pub fn put_raw(&self, key: &str, value: &[u8]) {
        self.entries.lock().insert(key.to_string(), value.to_vec());
    }

    fn check(&self) -> EngineResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::PersistenceUnavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        self.check()?;
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<bool> {
        self.check()?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
