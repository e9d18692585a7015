//! Durable local tier backed by LMDB.
//!
//! The environment lives in a `<name>.lmdb` directory and holds a single
//! named database of string keys. Values larger than the configured quota
//! are refused with [`StoreError::QuotaExceeded`], mirroring the per-origin
//! quota a browser enforces; a full LMDB map is reported the same way.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::info;

use crate::error::StoreError;
use crate::tiers::{KeyValueStore, TierKind};

const DB_NAME: &str = "reviews";
const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

struct LmdbHandle {
    env: Environment,
    db: Database,
}

/// LMDB-backed [`KeyValueStore`].
pub struct LmdbStore {
    dir: PathBuf,
    quota_bytes: Option<usize>,
    handle: Mutex<Option<LmdbHandle>>,
}

impl LmdbStore {
    /// Opens (or creates) the environment at `<name>.lmdb`.
    pub fn init(name: &str, quota_bytes: Option<usize>) -> Result<Self, StoreError> {
        let dir = PathBuf::from(format!("{name}.lmdb"));
        let handle = open_handle(&dir)?;
        info!("Durable review store opened at {}", dir.display());
        Ok(Self {
            dir,
            quota_bytes,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Removes every key. Returns how many entries were dropped.
    pub fn clear_all_records(&self) -> Result<usize, StoreError> {
        let guard = self.lock()?;
        let handle = guard.as_ref().ok_or(StoreError::Unavailable(TierKind::Durable))?;

        let mut txn = handle.env.begin_rw_txn().map_err(backend)?;
        let count = {
            let mut cursor = txn.open_ro_cursor(handle.db).map_err(backend)?;
            cursor.iter().count()
        };
        txn.clear_db(handle.db).map_err(backend)?;
        txn.commit().map_err(backend)?;
        Ok(count)
    }

    /// Drops the environment. Further operations report the tier unavailable.
    pub fn close_database(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.take().is_some() {
            info!("Durable review store at {} closed", self.dir.display());
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<LmdbHandle>>, StoreError> {
        self.handle
            .lock()
            .map_err(|_| StoreError::Unavailable(TierKind::Durable))
    }
}

impl KeyValueStore for LmdbStore {
    fn kind(&self) -> TierKind {
        TierKind::Durable
    }

    fn is_available(&self) -> bool {
        self.handle.lock().map(|h| h.is_some()).unwrap_or(false)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.lock()?;
        let handle = guard.as_ref().ok_or(StoreError::Unavailable(TierKind::Durable))?;
        let txn = handle.env.begin_ro_txn().map_err(backend)?;
        let found = txn.get(handle.db, &key).map(<[u8]>::to_vec);
        match found {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::MalformedData {
                    tier: TierKind::Durable,
                    detail: format!("value under {key} is not UTF-8: {e}"),
                }),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(StoreError::QuotaExceeded {
                    tier: TierKind::Durable,
                    bytes: value.len(),
                });
            }
        }

        let guard = self.lock()?;
        let handle = guard.as_ref().ok_or(StoreError::Unavailable(TierKind::Durable))?;
        let mut txn = handle.env.begin_rw_txn().map_err(backend)?;
        match txn.put(handle.db, &key, &value, WriteFlags::empty()) {
            Ok(()) => txn.commit().map_err(backend),
            Err(lmdb::Error::MapFull) => Err(StoreError::QuotaExceeded {
                tier: TierKind::Durable,
                bytes: value.len(),
            }),
            Err(e) => Err(backend(e)),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let handle = guard.as_ref().ok_or(StoreError::Unavailable(TierKind::Durable))?;
        let mut txn = handle.env.begin_rw_txn().map_err(backend)?;
        match txn.del(handle.db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => txn.commit().map_err(backend),
            Err(e) => Err(backend(e)),
        }
    }
}

fn open_handle(dir: &Path) -> Result<LmdbHandle, StoreError> {
    std::fs::create_dir_all(dir).map_err(|e| StoreError::Backend {
        tier: TierKind::Durable,
        detail: format!("failed to create {}: {e}", dir.display()),
    })?;
    let env = Environment::new()
        .set_max_dbs(1)
        .set_map_size(DEFAULT_MAP_SIZE)
        .open(dir)
        .map_err(backend)?;
    let db = env
        .create_db(Some(DB_NAME), DatabaseFlags::empty())
        .map_err(backend)?;
    Ok(LmdbHandle { env, db })
}

fn backend(err: lmdb::Error) -> StoreError {
    match err {
        lmdb::Error::MapFull => StoreError::QuotaExceeded {
            tier: TierKind::Durable,
            bytes: 0,
        },
        other => StoreError::Backend {
            tier: TierKind::Durable,
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir, quota: Option<usize>) -> LmdbStore {
        let name = dir.path().join("durable_test");
        LmdbStore::init(&name.to_string_lossy(), quota).unwrap()
    }

    #[test]
    fn stores_and_reads_values() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, None);

        assert_eq!(store.get("missing").unwrap(), None);
        store.set("k", "value").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("value"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn refuses_values_over_quota() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, Some(8));

        store.set("small", "1234").unwrap();
        assert!(store.set("big", "123456789").unwrap_err().is_quota());
        assert_eq!(store.get("big").unwrap(), None);
    }

    #[test]
    fn close_makes_store_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, None);

        store.close_database().unwrap();
        assert!(!store.is_available());
        assert_eq!(store.get("k"), Err(StoreError::Unavailable(TierKind::Durable)));
    }

    #[test]
    fn clear_drops_every_key() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, None);

        assert_eq!(store.clear_all_records().unwrap(), 0);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.clear_all_records().unwrap(), 2);
        assert_eq!(store.get("a").unwrap(), None);
        assert!(store.is_available());
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir, None);
            store.set("k", "persisted").unwrap();
        }
        let store = open(&dir, None);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("persisted"));
    }
}
