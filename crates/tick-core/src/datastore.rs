use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("quota exceeded writing {key}: needs {needed} bytes, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("i/o error on key {key}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// Synchronous durable key-value surface.
///
/// Receivers are `&self` so a single store can back several persisted
/// values at once; implementations carry their own interior mutability.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    quota: Option<usize>,
    unavailable: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total of key and value lengths, like a browser storage quota.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::default()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Writes a raw value, bypassing quota and availability checks.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }

        if let Some(limit) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        self.insert_raw(key, value);
        Ok(())
    }
}

/// One file per key under a data directory: `<data_dir>/<key>.json`.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");

        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::Unavailable(format!(
                "key {key:?} cannot be mapped to a file name"
            )));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        debug!(file = %path.display(), "reading key");

        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        debug!(file = %path.display(), "writing key atomically");

        save_atomic(&self.data_dir, &path, value).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })
    }
}

fn save_atomic(dir: &Path, path: &Path, value: &str) -> io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(value.as_bytes())?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{FileStore, KeyValueStore, MemoryStore, StoreError};

    #[test]
    fn memory_store_quota_rejects_oversized_write_and_keeps_old_value() {
        let store = MemoryStore::with_quota(16);
        store.set("k", "small").expect("fits");

        let err = store
            .set("k", "this value is far too long")
            .expect_err("should exceed quota");
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(store.get("k").expect("get").as_deref(), Some("small"));
    }

    #[test]
    fn memory_store_unavailable_fails_reads_and_writes() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.get("k").is_err());
        assert!(store.set("k", "v").is_err());

        store.set_unavailable(false);
        store.set("k", "v").expect("available again");
    }

    #[test]
    fn file_store_missing_key_reads_none() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        assert_eq!(store.get("todos").expect("get"), None);
    }

    #[test]
    fn file_store_writes_one_file_per_key() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");

        store.set("dark-mode", "true").expect("set");
        assert!(temp.path().join("dark-mode.json").exists());
        assert_eq!(
            store.get("dark-mode").expect("get").as_deref(),
            Some("true")
        );

        store.set("dark-mode", "false").expect("overwrite");
        assert_eq!(
            store.get("dark-mode").expect("get").as_deref(),
            Some("false")
        );
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }
}
