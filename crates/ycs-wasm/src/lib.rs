//! WebAssembly bindings for YouTube Control Suite
//!
//! One module serves three contexts: the content script (`ContentScript`),
//! the injected page scripts (`run*Script`, `Normalizer`) and the popup
//! (the settings helpers below).

use js_sys::{Array, Object, Reflect};
use serde_json::Value;
use wasm_bindgen::prelude::*;

use ycs_core::filters::sponsorship::{filter_sponsored, should_intercept};
use ycs_core::player::closest_available_quality;
use ycs_core::{migrate, ExtensionSettings, PageKind, Quality};

mod browser;
mod content;
mod page;

pub use content::ContentScript;
pub use page::{
    run_audio_track_script, run_quality_script, run_speed_script, run_subtitles_script, run_volume_script,
    Normalizer,
};

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Backfill a stored settings record against the schema default.
///
/// Returns `{ settings, added }` where `settings` is the migrated record as a
/// JSON string and `added` lists the dotted paths that were filled in.
#[wasm_bindgen]
pub fn migrate_settings(stored_json: &str) -> Result<JsValue, JsValue> {
    let stored: Value = if stored_json.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(stored_json).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))?
    };
    let migration = migrate(&stored, &ExtensionSettings::default_value());
    let settings = serde_json::to_string(&migration.settings).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let added = Array::new();
    for path in &migration.added {
        added.push(&JsValue::from_str(path));
    }

    let js_result = Object::new();
    let _ = Reflect::set(&js_result, &"settings".into(), &JsValue::from_str(&settings));
    let _ = Reflect::set(&js_result, &"added".into(), &added);
    Ok(js_result.into())
}

/// The schema default settings record as a JSON string.
#[wasm_bindgen]
pub fn default_settings() -> String {
    ExtensionSettings::default_value().to_string()
}

#[wasm_bindgen]
pub fn classify_page(url: &str) -> String {
    PageKind::classify(url).name().to_string()
}

/// Quality the player would pick for `preferred` given its available levels.
#[wasm_bindgen]
pub fn closest_quality(preferred: &str, available: JsValue) -> Option<String> {
    let preferred = Quality::parse(preferred)?;
    let available: Vec<Quality> = Array::from(&available)
        .iter()
        .filter_map(|q| q.as_string())
        .filter_map(|q| Quality::parse(&q))
        .collect();
    closest_available_quality(preferred, &available).map(|q| q.as_str().to_string())
}

#[wasm_bindgen]
pub fn should_intercept_url(url: &str) -> bool {
    should_intercept(url)
}

/// Strip members-only items from an intercepted API response body.
///
/// Returns the rewritten body, or `undefined` when nothing was removed or the
/// URL is not one of the filtered endpoints.
#[wasm_bindgen]
pub fn filter_api_response(url: &str, body: &str) -> Option<String> {
    if !should_intercept(url) {
        return None;
    }
    let mut value: Value = serde_json::from_str(body).ok()?;
    if filter_sponsored(&mut value).is_empty() {
        return None;
    }
    serde_json::to_string(&value).ok()
}
