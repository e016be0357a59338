//! Keyed JSON persistence.
//!
//! Each key maps to `<dir>/<key>.json`. Reads fall back to a caller-supplied
//! default; writes happen on every change.
//!
//! ```text
//! <data_dir>/
//! ├── generated-apps.json        # AppRecord list
//! ├── user-settings.json         # Settings
//! ├── pending-deployment.json    # DeployCheckpoint of the last failed deploy
//! └── orphaned-repositories.json # Repositories left behind by abandoned deploys
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::StoreError;

/// Key under which the app registry is stored.
pub const APPS_KEY: &str = "generated-apps";
/// Key under which user settings are stored.
pub const SETTINGS_KEY: &str = "user-settings";

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Read `key`, returning `default` when the entry is absent, holds a
    /// literal `null`, or cannot be read.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!("{e}");
                default
            }
        }
    }

    /// Read `key`. Absent and `null` entries are `Ok(None)`; an entry that
    /// exists but cannot be read or parsed as `T` is an error.
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let parse_err = |source| StoreError::Parse {
            key: key.to_string(),
            source,
        };
        match serde_json::from_str::<serde_json::Value>(&raw).map_err(parse_err)? {
            serde_json::Value::Null => Ok(None),
            value => serde_json::from_value(value).map(Some).map_err(parse_err),
        }
    }

    /// Copy the entry for `key` to `<key>.json.bak`, replacing an older
    /// backup. Returns the backup path, or `None` when there is no entry.
    pub fn backup(&self, key: &str) -> Result<Option<PathBuf>, StoreError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let backup = self.dir.join(format!("{key}.json.bak"));
        std::fs::copy(&path, &backup).map_err(|source| StoreError::Io {
            path: backup.clone(),
            source,
        })?;
        Ok(Some(backup))
    }

    /// Write `value` under `key`. A value that serializes to `null` removes
    /// the entry instead.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let json = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        if json.is_null() {
            return self.remove(key);
        }

        let body = serde_json::to_string_pretty(&json).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(body.as_bytes()).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        tracing::debug!(key, "store entry written");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.exists()).unwrap_or(false)
    }
}
