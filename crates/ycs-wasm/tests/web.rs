#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Reflect};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use ycs_wasm::{classify_page, closest_quality, default_settings, filter_api_response, migrate_settings, should_intercept_url};

#[wasm_bindgen_test]
fn test_default_settings_is_json_object() {
    let value: serde_json::Value = serde_json::from_str(&default_settings()).unwrap();
    assert!(value.get("videoQuality").is_some());
    assert!(value.get("hideShorts").is_some());
}

#[wasm_bindgen_test]
fn test_migrate_empty_record_fills_every_feature() {
    let result = migrate_settings("").unwrap();
    let added = Array::from(&Reflect::get(&result, &"added".into()).unwrap());
    assert_eq!(added.length(), 8);
    let settings = Reflect::get(&result, &"settings".into()).unwrap().as_string().unwrap();
    assert!(settings.contains("audioTrack"));
}

#[wasm_bindgen_test]
fn test_migrate_rejects_invalid_json() {
    assert!(migrate_settings("{not json").is_err());
}

#[wasm_bindgen_test]
fn test_classify_page() {
    assert_eq!(classify_page("https://www.youtube.com/watch?v=abc"), "Watch");
    assert_eq!(classify_page("https://www.youtube.com/shorts/abc"), "Shorts");
}

#[wasm_bindgen_test]
fn test_closest_quality_falls_back_lower() {
    let available = Array::new();
    available.push(&JsValue::from_str("hd720"));
    available.push(&JsValue::from_str("large"));
    assert_eq!(closest_quality("hd1080", available.into()), Some("hd720".to_string()));
}

#[wasm_bindgen_test]
fn test_filter_api_response() {
    let body = r#"{"items":[{"videoRenderer":{"title":{"runs":[{"text":"Members"}]},"badges":[{"metadataBadgeRenderer":{"icon":{"iconType":"SPONSORSHIP_STAR"}}}]}},{"videoRenderer":{"title":{"runs":[{"text":"Public"}]}}}]}"#;
    let url = "https://www.youtube.com/youtubei/v1/browse?key=x";
    assert!(should_intercept_url(url));

    let filtered = filter_api_response(url, body).unwrap();
    assert!(!filtered.contains("Members"));
    assert!(filtered.contains("Public"));

    assert_eq!(filter_api_response("https://www.youtube.com/api/stats", body), None);
    assert_eq!(filter_api_response(url, r#"{"items":[]}"#), None);
}
