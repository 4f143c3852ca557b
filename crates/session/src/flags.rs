//! The two session markers that outlive a single coordinator: whether the
//! user is authenticated, and whether a logout is currently in progress.
//! Other parts of the application read them to avoid re-authenticating a
//! session that is being torn down.

use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

pub const AUTHENTICATED_KEY: &str = "casekeep.session.authenticated";
pub const LOGOUT_IN_PROGRESS_KEY: &str = "casekeep.session.logout_in_progress";

const TRUE: &str = "true";

/// String key-value storage for session markers.
pub trait FlagStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryFlagStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// JSON map on disk, shared by every process of the same user.
#[derive(Debug)]
pub struct FileFlagStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileFlagStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casekeep")
            .join("session-flags.json")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a concurrent reader never sees a torn file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        apply(&mut values);
        self.write_all(&values)
    }
}

impl FlagStore for FileFlagStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

/// Typed access to the session markers. Storage failures are logged and
/// treated as "flag absent"; callers are on best-effort paths.
#[derive(Clone)]
pub struct SessionFlags {
    store: Arc<dyn FlagStore>,
}

impl fmt::Debug for SessionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFlags")
            .field("authenticated", &self.is_authenticated())
            .field("logout_in_progress", &self.logout_in_progress())
            .finish()
    }
}

impl SessionFlags {
    #[must_use]
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryFlagStore::new()))
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read(AUTHENTICATED_KEY).is_some()
    }

    pub fn mark_authenticated(&self) {
        self.write(AUTHENTICATED_KEY, Some(TRUE));
    }

    pub fn clear_authenticated(&self) {
        self.write(AUTHENTICATED_KEY, None);
    }

    #[must_use]
    pub fn logout_in_progress(&self) -> bool {
        self.read(LOGOUT_IN_PROGRESS_KEY).as_deref() == Some(TRUE)
    }

    pub fn set_logout_in_progress(&self, in_progress: bool) {
        self.write(LOGOUT_IN_PROGRESS_KEY, in_progress.then_some(TRUE));
    }

    fn read(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap_or_else(|e| {
            warn!("Failed to read session flag {}: {}", key, e);
            None
        })
    }

    fn write(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        if let Err(e) = result {
            warn!("Failed to update session flag {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_flags_lifecycle() {
        let flags = SessionFlags::in_memory();
        assert!(!flags.is_authenticated());
        assert!(!flags.logout_in_progress());

        flags.mark_authenticated();
        flags.set_logout_in_progress(true);
        assert!(flags.is_authenticated());
        assert!(flags.logout_in_progress());

        flags.clear_authenticated();
        flags.set_logout_in_progress(false);
        assert!(!flags.is_authenticated());
        assert!(!flags.logout_in_progress());
    }

    #[test]
    fn test_logout_flag_requires_exact_true() {
        let store = Arc::new(MemoryFlagStore::new());
        store.set(LOGOUT_IN_PROGRESS_KEY, "yes").unwrap();
        let flags = SessionFlags::new(store);
        assert!(!flags.logout_in_progress());
    }

    #[test]
    fn test_file_store_is_shared_between_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("session-flags.json");

        let writer = SessionFlags::new(Arc::new(FileFlagStore::new(&path)));
        let reader = SessionFlags::new(Arc::new(FileFlagStore::new(&path)));

        writer.mark_authenticated();
        writer.set_logout_in_progress(true);
        assert!(reader.is_authenticated());
        assert!(reader.logout_in_progress());

        reader.set_logout_in_progress(false);
        assert!(!writer.logout_in_progress());
        assert!(writer.is_authenticated());
    }

    #[test]
    fn test_file_store_missing_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileFlagStore::new(temp_dir.path().join("absent.json"));
        assert_eq!(store.get(AUTHENTICATED_KEY).unwrap(), None);
        store.remove(AUTHENTICATED_KEY).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_treated_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session-flags.json");
        std::fs::write(&path, "{not json").unwrap();

        let flags = SessionFlags::new(Arc::new(FileFlagStore::new(&path)));
        assert!(!flags.is_authenticated());
        assert!(!flags.logout_in_progress());
    }
}
