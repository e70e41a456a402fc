//! String key-value stores used as the fallback persistence layer.
//!
//! # Responsibility
//! - Define the minimal `get/set/remove` contract of the fallback store.
//! - Provide a file-backed store and an in-memory store with a byte quota.
//!
//! # Invariants
//! - `set` either stores the full value or leaves the previous one intact.
//! - Keys are restricted to `[A-Za-z0-9._-]` so they map to file names.

use log::warn;
use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub type KvResult<T> = Result<T, KvError>;

/// Key-value store failure.
#[derive(Debug)]
pub enum KvError {
    /// Key contains characters outside the allowed set.
    InvalidKey(String),
    /// Write would exceed the configured quota.
    QuotaExceeded { needed_bytes: usize, quota_bytes: usize },
    Io { path: PathBuf, source: io::Error },
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
            Self::QuotaExceeded {
                needed_bytes,
                quota_bytes,
            } => write!(
                f,
                "storage quota exceeded: need {needed_bytes} bytes, quota is {quota_bytes} bytes"
            ),
            Self::Io { path, source } => write!(f, "storage io error at `{}`: {source}", path.display()),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Minimal string key-value contract (localStorage-like).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> KvResult<()>;
    fn remove(&self, key: &str) -> KvResult<()>;
}

/// Directory-backed store, one file per key.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Opens (and creates if needed) the backing directory.
    pub fn open(dir: impl AsRef<Path>) -> KvResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| KvError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> KvResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(KvError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("json.tmp");
        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        };
        write().map_err(|source| {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(
                        "event=kv_set module=storage status=error error_code=tmp_cleanup_failed error={}",
                        cleanup
                    );
                }
            }
            KvError::Io {
                path: path.clone(),
                source,
            }
        })
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KvError::Io { path, source }),
        }
    }
}

/// In-process store with an optional total byte quota.
///
/// Mirrors browser storage quotas; used by tests and as a last-resort
/// fallback when no writable directory exists.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RefCell<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store rejecting writes once keys + values exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Total bytes currently held (keys + values).
    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        validate_key(key)?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        validate_key(key)?;
        if let Some(quota_bytes) = self.quota_bytes {
            let replaced = self
                .entries
                .borrow()
                .get(key)
                .map_or(0, |old| key.len() + old.len());
            let needed_bytes = self.used_bytes() - replaced + key.len() + value.len();
            if needed_bytes > quota_bytes {
                return Err(KvError::QuotaExceeded {
                    needed_bytes,
                    quota_bytes,
                });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        validate_key(key)?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

fn validate_key(key: &str) -> KvResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(KvError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{FileKeyValueStore, KeyValueStore, KvError, MemoryKeyValueStore};

    #[test]
    fn memory_store_enforces_quota_and_keeps_old_value() {
        let store = MemoryKeyValueStore::with_quota(16);
        store.set("k", "small").unwrap();

        let err = store.set("k", "this value is far too long").unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { .. }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn memory_store_quota_accounts_for_replaced_value() {
        let store = MemoryKeyValueStore::with_quota(10);
        store.set("k", "123456789").unwrap();
        store.set("k", "987654321").unwrap();
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn file_store_roundtrips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path().join("kv")).unwrap();

        assert_eq!(store.get("recipes").unwrap(), None);
        store.set("recipes", "[]").unwrap();
        assert_eq!(store.get("recipes").unwrap().as_deref(), Some("[]"));

        store.remove("recipes").unwrap();
        store.remove("recipes").unwrap();
        assert_eq!(store.get("recipes").unwrap(), None);
    }

    #[test]
    fn keys_with_path_separators_are_rejected() {
        let store = MemoryKeyValueStore::new();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(KvError::InvalidKey(_))
        ));
    }

    #[test]
    fn failed_file_write_keeps_previous_value_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("blocked.json")).unwrap();

        let err = store.set("blocked", "[]").unwrap_err();
        assert!(matches!(err, KvError::Io { .. }));
        assert!(!dir.path().join("blocked.json.tmp").exists());
        assert!(dir.path().join("blocked.json").is_dir());
    }
}
