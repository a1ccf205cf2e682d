//! Preference bridge
//!
//! Moves a feature's sub-record from extension storage into the page-readable
//! store and injects the feature's page script when it is enabled. The page
//! store holds one composite JSON blob; each feature only rewrites its own key.

use std::cell::RefCell;
use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::message::PageMessage;
use crate::settings::ExtensionSettings;
use crate::store::{SettingsStorage, SettingsStore, StoreConfig};
use crate::types::{Feature, PageScript, ScriptMode};
use crate::url::PageKind;

/// Error type for page-context operations.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Page store write failed: {0}")]
    Store(String),
    #[error("Script injection failed: {0}")]
    Inject(String),
    #[error("Message post failed: {0}")]
    Post(String),
}

/// The page context as seen from the content script.
pub trait PageContext {
    /// Read from the page-readable store (`localStorage`).
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), PageError>;
    /// Append the script to the document.
    fn inject(&self, script: PageScript) -> Result<(), PageError>;
    /// One-way broadcast into the page context.
    fn post_message(&self, message: &PageMessage) -> Result<(), PageError>;
}

/// Why an enabled feature was not injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Speed is configured not to touch Shorts and this is a Shorts page.
    ShortsExcluded,
    /// Manual activation mode and the user has not toggled the feature on.
    AwaitingManualActivation,
    /// The feature has no page script (work happens on the content side).
    NoScript,
}

/// Result of activating a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Disabled,
    Skipped(SkipReason),
    Injected(PageScript),
    /// A persistent script is already running and re-reads the store itself.
    AlreadyActive(PageScript),
    Failed,
}

/// Per-feature synchronisation into the page context.
pub struct PreferenceBridge {
    page_key: String,
    persistent: RefCell<HashSet<PageScript>>,
}

impl Default for PreferenceBridge {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl PreferenceBridge {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            page_key: config.page_store_key.clone(),
            persistent: RefCell::new(HashSet::new()),
        }
    }

    /// Load current settings and copy `feature`'s sub-record into the page store.
    pub async fn sync<S, C>(&self, store: &SettingsStore<S>, page: &C, feature: Feature) -> ExtensionSettings
    where
        S: SettingsStorage,
        C: PageContext,
    {
        let settings = store.load().await;
        self.write(page, feature, &settings);
        settings
    }

    /// `sync`, then `activate`.
    pub async fn apply<S, C>(
        &self,
        store: &SettingsStore<S>,
        page: &C,
        feature: Feature,
        kind: PageKind,
    ) -> ApplyOutcome
    where
        S: SettingsStorage,
        C: PageContext,
    {
        self.sync(store, page, feature).await;
        self.activate(page, feature, kind)
    }

    /// Write `feature`'s sub-record from an in-memory snapshot.
    pub fn write<C: PageContext>(&self, page: &C, feature: Feature, settings: &ExtensionSettings) {
        let record = match serde_json::to_value(settings) {
            Ok(Value::Object(mut all)) => all.remove(feature.key()).unwrap_or(Value::Null),
            Ok(_) => Value::Null,
            Err(e) => {
                log::error!(target: feature.log_target(), "Cannot encode settings: {}", e);
                return;
            }
        };

        let mut blob = self.read_blob(page);
        blob.insert(feature.key().to_string(), record);

        match serde_json::to_string(&Value::Object(blob)) {
            Ok(text) => {
                if let Err(e) = page.set_item(&self.page_key, &text) {
                    log::error!(target: feature.log_target(), "Error syncing {} preference: {}", feature, e);
                } else {
                    log::debug!(target: feature.log_target(), "Synced {} preference to page store", feature);
                }
            }
            Err(e) => log::error!(target: feature.log_target(), "Cannot encode page store: {}", e),
        }
    }

    /// Inject the feature's script if the page store says it is enabled.
    ///
    /// Reads the page store rather than the in-memory snapshot so a concurrent
    /// writer's latest value wins.
    pub fn activate<C: PageContext>(&self, page: &C, feature: Feature, kind: PageKind) -> ApplyOutcome {
        let blob = self.read_blob(page);
        let record = blob.get(feature.key());
        let flag = |name: &str| record.and_then(|r| r.get(name)).and_then(Value::as_bool);

        if flag("enabled") != Some(true) {
            log::debug!(target: feature.log_target(), "{} is disabled, not injecting script", feature);
            return ApplyOutcome::Disabled;
        }

        match feature {
            Feature::VideoSpeed if kind == PageKind::Shorts && flag("applyToShorts") == Some(false) => {
                log::info!(target: feature.log_target(), "Not applying speed to shorts (disabled in settings)");
                return ApplyOutcome::Skipped(SkipReason::ShortsExcluded);
            }
            Feature::AudioNormalizer if flag("manualActivation") == Some(true) && flag("active") != Some(true) => {
                log::debug!(target: feature.log_target(), "Normalizer waiting for manual activation");
                return ApplyOutcome::Skipped(SkipReason::AwaitingManualActivation);
            }
            _ => {}
        }

        let Some(script) = feature.script() else {
            return ApplyOutcome::Skipped(SkipReason::NoScript);
        };

        if script.mode() == ScriptMode::Persistent && self.persistent.borrow().contains(&script) {
            return ApplyOutcome::AlreadyActive(script);
        }

        match page.inject(script) {
            Ok(()) => {
                if script.mode() == ScriptMode::Persistent {
                    self.persistent.borrow_mut().insert(script);
                }
                ApplyOutcome::Injected(script)
            }
            Err(e) => {
                log::error!(target: feature.log_target(), "Failed to inject {}: {}", script.path(), e);
                ApplyOutcome::Failed
            }
        }
    }

    /// Current composite blob; a missing or malformed blob reads as empty.
    pub fn read_blob<C: PageContext>(&self, page: &C) -> Map<String, Value> {
        let Some(raw) = page.get_item(&self.page_key) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                log::warn!(target: "ycs::core", "Page store blob is malformed, starting fresh");
                Map::new()
            }
        }
    }

    /// Forget persistent injections (the page was reloaded).
    pub fn reset(&self) {
        self.persistent.borrow_mut().clear();
    }
}
