//! Durable key-value substrate under the store: whole-value get/set/remove by key.

use fs2::FileExt;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::StoreError;

/// Whole-value string storage keyed by namespace. Absent keys read as `None`.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key under a data directory.
///
/// Writes go to a temp file and are renamed into place while holding an exclusive lock on
/// `.lock`, so a reader never sees a half-written record. There is no read-modify-write
/// lock across processes: two processes updating the same key race and the last write wins.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Open (creating if needed) a data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock(&self) -> Result<fs::File, StoreError> {
        let path = self.dir.join(".lock");
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| StoreError::io(&path, e))?;
        Ok(file)
    }
}

impl KvBackend for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        let lock = self.lock()?;
        let res = fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| StoreError::io(&path, e));
        if let Err(e) = FileExt::unlock(&lock) {
            log::warn!("store: releasing lock in {}: {}", self.dir.display(), e);
        }
        res
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

/// In-memory backend for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryKv {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let g = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(g.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut g = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut g = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        g.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("nexuschat-kv-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn file_kv_missing_key_is_none() {
        let kv = FileKv::open(temp_dir()).unwrap();
        assert_eq!(kv.get("nothing").unwrap(), None);
        kv.remove("nothing").unwrap();
    }

    #[test]
    fn file_kv_set_overwrites_whole_value() {
        let dir = temp_dir();
        let kv = FileKv::open(&dir).unwrap();
        kv.set("k", "[1,2,3]").unwrap();
        kv.set("k", "[4]").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("[4]"));
        assert!(dir.join("k.json").exists());
        assert!(!dir.join(".k.json.tmp").exists());
        kv.remove("k").unwrap();
        assert_eq!(kv.get("k").unwrap(), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn memory_kv_round_trip() {
        let kv = MemoryKv::new();
        kv.set("a", "1").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("1"));
        kv.remove("a").unwrap();
        assert_eq!(kv.get("a").unwrap(), None);
    }
}
