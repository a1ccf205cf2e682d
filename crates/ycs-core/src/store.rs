//! Settings store adapter
//!
//! Reads and writes the single `settings` record in extension storage. Every
//! failure is logged and absorbed here: callers always get a usable
//! `ExtensionSettings` and a save never fails loudly.

use serde::Deserialize;
use serde_json::Value;

use crate::settings::{migrate, ExtensionSettings, Migration};

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage read failed: {0}")]
    Read(String),
    #[error("Storage write failed: {0}")]
    Write(String),
}

/// Asynchronous key-value storage (the browser's `storage.local`).
#[allow(async_fn_in_trait)]
pub trait SettingsStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Storage key layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Key of the settings record in extension storage.
    pub storage_key: String,
    /// Key of the composite blob in the page-readable store.
    pub page_store_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: "settings".to_string(),
            page_store_key: "YCS_SETTINGS".to_string(),
        }
    }
}

/// Migrate a raw stored record and decode it.
///
/// Fields that still fail to decode after migration are reset to their
/// default one at a time, so a single bad value never costs the rest of the
/// record. Returns defaults only when even that repair cannot produce a
/// decodable record.
pub fn decode_settings(raw: &Value) -> (ExtensionSettings, Migration) {
    let defaults = ExtensionSettings::default_value();
    let mut migration = migrate(raw, &defaults);
    if let Ok(settings) = serde_json::from_value::<ExtensionSettings>(migration.settings.clone()) {
        return (settings, migration);
    }

    let repaired = repair_undecodable(&mut migration.settings, &defaults);
    migration.added.extend(repaired);
    let settings = match serde_json::from_value::<ExtensionSettings>(migration.settings.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!(target: "ycs::core", "Stored settings unreadable, using defaults: {}", e);
            ExtensionSettings::default()
        }
    };
    (settings, migration)
}

fn decodes(candidate: &Value) -> bool {
    serde_json::from_value::<ExtensionSettings>(candidate.clone()).is_ok()
}

/// Reset every field that keeps its feature record from decoding.
/// Returns the dotted paths that were reset.
fn repair_undecodable(settings: &mut Value, defaults: &Value) -> Vec<String> {
    let mut repaired = Vec::new();
    let (Some(records), Some(default_records)) = (settings.as_object_mut(), defaults.as_object()) else {
        return repaired;
    };

    for (feature, default_record) in default_records {
        let Some(mut record) = records.get(feature).cloned() else {
            continue;
        };
        let mut candidate = defaults.clone();
        candidate[feature.as_str()] = record.clone();
        if decodes(&candidate) {
            continue;
        }

        if let (Some(fields), Some(default_fields)) = (record.as_object_mut(), default_record.as_object()) {
            for (name, value) in fields.iter_mut() {
                let mut single = default_record.clone();
                single[name.as_str()] = value.clone();
                candidate[feature.as_str()] = single;
                if !decodes(&candidate) {
                    *value = default_fields.get(name).cloned().unwrap_or(Value::Null);
                    log::warn!(target: "ycs::core", "Repair: reset unreadable field {}.{}", feature, name);
                    repaired.push(format!("{}.{}", feature, name));
                }
            }
        }

        candidate[feature.as_str()] = record.clone();
        if !decodes(&candidate) {
            record = default_record.clone();
            log::warn!(target: "ycs::core", "Repair: reset unreadable feature {}", feature);
            repaired.push(feature.clone());
        }
        records.insert(feature.clone(), record);
    }
    repaired
}

/// Adapter over a `SettingsStorage` backend.
pub struct SettingsStore<S> {
    storage: S,
    key: String,
}

impl<S: SettingsStorage> SettingsStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, &StoreConfig::default())
    }

    pub fn with_config(storage: S, config: &StoreConfig) -> Self {
        Self {
            storage,
            key: config.storage_key.clone(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the current settings, migrating and persisting backfilled fields.
    pub async fn load(&self) -> ExtensionSettings {
        let raw = match self.storage.get(&self.key).await {
            Ok(Some(raw)) if !raw.is_null() => raw,
            Ok(_) => return ExtensionSettings::default(),
            Err(e) => {
                log::error!(target: "ycs::core", "Failed to load settings, using defaults: {}", e);
                return ExtensionSettings::default();
            }
        };

        let (settings, migration) = decode_settings(&raw);
        if migration.changed() {
            // Persist the repaired record; the caller never sees this outcome.
            if let Err(e) = self.storage.set(&self.key, migration.settings).await {
                log::error!(target: "ycs::core", "Error saving migrated settings: {}", e);
            }
        }
        settings
    }

    /// Persist a full settings snapshot.
    pub async fn save(&self, settings: &ExtensionSettings) {
        let value = match serde_json::to_value(settings) {
            Ok(value) => value,
            Err(e) => {
                log::error!(target: "ycs::core", "Failed to encode settings: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.key, value).await {
            log::error!(target: "ycs::core", "Failed to save settings: {}", e);
        }
    }

    /// Write defaults when nothing is stored yet (first install).
    /// Returns whether defaults were written.
    pub async fn initialize(&self) -> bool {
        match self.storage.get(&self.key).await {
            Ok(Some(raw)) if !raw.is_null() => false,
            Ok(_) => {
                self.save(&ExtensionSettings::default()).await;
                log::info!(target: "ycs::core", "Settings initialized with default values");
                true
            }
            Err(e) => {
                log::error!(target: "ycs::core", "Cannot read settings during install: {}", e);
                false
            }
        }
    }
}
