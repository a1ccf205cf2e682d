//! Members-only (sponsorship) items in intercepted YouTube API responses
//!
//! The page-context fetch interceptor hands response bodies of the innertube
//! endpoints to `filter_sponsored`, which removes flagged items in place.

use serde_json::Value;

const ENDPOINTS: [&str; 4] = [
    "/youtubei/v1/search",
    "/youtubei/v1/browse",
    "/youtubei/v1/next",
    "/youtubei/v1/player",
];

const SPONSORSHIP_ICON: &str = "SPONSORSHIP_STAR";
const UNKNOWN_TITLE: &str = "[Unknown Title]";

/// Whether a fetch to `url` should be filtered.
pub fn should_intercept(url: &str) -> bool {
    ENDPOINTS.iter().any(|endpoint| url.contains(endpoint))
}

/// A `videoRenderer` object carries the sponsorship star badge.
pub fn is_sponsorship_item(renderer: &Value) -> bool {
    let Some(badges) = renderer.get("badges").and_then(Value::as_array) else {
        return false;
    };
    badges.iter().any(|badge| {
        badge.pointer("/metadataBadgeRenderer/icon/iconType").and_then(Value::as_str) == Some(SPONSORSHIP_ICON)
    })
}

/// The first sponsorship-flagged video renderer of an array item, checking
/// the grid layout and the list layout.
fn sponsored_renderer(item: &Value) -> Option<&Value> {
    [
        item.pointer("/richItemRenderer/content/videoRenderer"),
        item.get("videoRenderer"),
    ]
    .into_iter()
    .flatten()
    .find(|renderer| is_sponsorship_item(renderer))
}

fn title(renderer: &Value) -> String {
    renderer
        .pointer("/title/runs/0/text")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_TITLE)
        .to_string()
}

/// Recursively remove sponsorship-flagged items from every array in `value`.
/// Returns the titles of the removed videos.
pub fn filter_sponsored(value: &mut Value) -> Vec<String> {
    let mut removed = Vec::new();
    filter_into(value, &mut removed);
    for title in &removed {
        log::info!(target: "ycs::members", "Removed members-only video: \"{}\"", title);
    }
    removed
}

fn filter_into(value: &mut Value, removed: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            items.retain(|item| match sponsored_renderer(item) {
                Some(renderer) => {
                    removed.push(title(renderer));
                    false
                }
                None => true,
            });
            for item in items.iter_mut() {
                filter_into(item, removed);
            }
        }
        Value::Object(map) => {
            for child in map.values_mut() {
                filter_into(child, removed);
            }
        }
        _ => {}
    }
}
