//! YouTube Control Suite Core Library
//!
//! Settings propagation and page observation for the YouTube Control Suite
//! browser extension. The crate is host-independent: storage, the page
//! context, the DOM and the player are reached through traits that the wasm
//! crate implements over browser APIs and the tests implement in memory.
//!
//! # Architecture
//!
//! An explicit settings change (a popup message) and an implicit page change
//! (navigation, a new video source, streamed-in grid items) both end in the
//! same idempotent re-apply path: the preference bridge copies a feature's
//! sub-record into the page-readable store and injects the feature's page
//! script, which re-reads that store every time it runs.
//!
//! # Modules
//!
//! - `settings`: Settings model, defaults and additive migration
//! - `store`: Extension storage adapter
//! - `bridge`: Per-feature sync into the page context
//! - `message`: Runtime and page message types
//! - `observe`: Sans-IO observation state machine
//! - `orchestrator`: Content-script context object
//! - `filters`: Shorts, members-only and sponsorship rules
//! - `player`: Decision logic of the page-context scripts
//! - `retry`: Bounded retry helper
//! - `url`: URL parsing and page classification
//! - `types`: Shared type definitions

pub mod bridge;
pub mod filters;
pub mod message;
pub mod observe;
pub mod orchestrator;
pub mod player;
pub mod retry;
pub mod settings;
pub mod store;
pub mod types;
pub mod url;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use bridge::{ApplyOutcome, PageContext, PreferenceBridge};
pub use message::{FeatureUpdate, MessageError, PageMessage, RuntimeMessage};
pub use observe::{ObservationLayer, ObserverConfig, PageHost, Subscription, Trigger};
pub use orchestrator::{ContentConfig, FilterReport, Orchestrator};
pub use settings::{migrate, ExtensionSettings, Quality};
pub use store::{SettingsStorage, SettingsStore, StoreConfig};
pub use types::{Feature, Millis, PageScript};
pub use url::PageKind;
