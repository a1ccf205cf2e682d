//! JSON file standing in for the extension's `storage.local` area.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use ycs_core::store::{SettingsStorage, StorageError};

/// A storage area dumped to disk as one JSON object of key/value pairs.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_area(&self) -> Result<Map<String, Value>, StorageError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|e| StorageError::Read(format!("'{}': {}", self.path.display(), e)))?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&text) {
            Ok(Value::Object(area)) => Ok(area),
            Ok(_) => Err(StorageError::Read(format!("'{}' is not a JSON object", self.path.display()))),
            Err(e) => Err(StorageError::Read(format!("'{}': {}", self.path.display(), e))),
        }
    }
}

impl SettingsStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.read_area()?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut area = self.read_area()?;
        area.insert(key.to_string(), value);
        let text = serde_json::to_string_pretty(&Value::Object(area)).map_err(|e| StorageError::Write(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| StorageError::Write(format!("'{}': {}", self.path.display(), e)))?;
        log::debug!(target: "ycs::core", "Wrote '{}' to {}", key, self.path.display());
        Ok(())
    }
}
