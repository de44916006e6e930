//! Durable storage for the language preference.
//!
//! One value per key. The file store keeps each key in its own small file under
//! `~/.folio/`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage key holding the resolved language code.
pub const LANGUAGE_KEY: &str = "rex_resume_lang";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("preference storage unavailable: {0}")]
    Unavailable(String),
    #[error("preference io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key/value store for client preferences.
pub trait PreferenceStore: Send + Sync {
    /// Stored value for `key`; `Ok(None)` when nothing has been saved yet.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Directory used by [`FilePreferenceStore::default_location`].
pub fn default_preference_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".folio"))
}

/// Stores each key as a file `<dir>/<key>` containing the trimmed value.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    dir: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `~/.folio/`, or `None` when there is no home directory.
    pub fn default_location() -> Option<Self> {
        default_preference_dir().map(Self::new)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(s) => {
                let v = s.trim();
                Ok(if v.is_empty() { None } else { Some(v.to_string()) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        std::fs::write(&path, value).map_err(|source| StorageError::Io { path, source })
    }
}

/// Process-lifetime store; also what [`super::LanguageState`] falls back to when durable storage fails.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut g) = store.values.lock() {
            g.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let g = self
            .values
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))?;
        Ok(g.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut g = self
            .values
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))?;
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("folio-prefs-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn file_store_missing_key_is_none() {
        let store = FilePreferenceStore::new(temp_dir());
        assert!(store.load(LANGUAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn file_store_round_trips_value() {
        let dir = temp_dir();
        let store = FilePreferenceStore::new(&dir);
        store.save(LANGUAGE_KEY, "ja").unwrap();
        assert_eq!(store.load(LANGUAGE_KEY).unwrap().as_deref(), Some("ja"));
        assert!(dir.join(LANGUAGE_KEY).exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn file_store_reports_unwritable_dir() {
        let dir = temp_dir();
        std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
        // A regular file where the directory should be.
        std::fs::write(&dir, b"x").unwrap();
        let store = FilePreferenceStore::new(&dir);
        assert!(matches!(
            store.save(LANGUAGE_KEY, "en"),
            Err(StorageError::Io { .. })
        ));
        let _ = std::fs::remove_file(dir);
    }
}
