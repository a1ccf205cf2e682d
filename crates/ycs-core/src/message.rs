//! Message types crossing context boundaries
//!
//! Runtime messages arrive from the popup as untyped JSON and are validated
//! once here into `RuntimeMessage`; everything past this point matches on
//! variants. Page messages travel the other way, from the content script into
//! the page context via `postMessage`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::{
    volume_level, AudioLanguage, CompressorSettings, ExtensionSettings, NormalizerPreset, Quality, SubtitleLanguage,
};
use crate::store::decode_settings;
use crate::types::Feature;

#[cfg(feature = "ts")]
use ts_rs::TS;

/// Error type for message validation.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message is not an object")]
    NotAnObject,
    #[error("Unknown message shape")]
    UnknownShape,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid {kind} message: {source}")]
    Invalid {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Runtime messages (popup -> content script)
// =============================================================================

/// Granular update of a single feature, without replacing the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "camelCase")]
pub enum FeatureUpdate {
    #[serde(rename_all = "camelCase")]
    VideoQuality { quality: Quality, enabled: bool },
    #[serde(rename_all = "camelCase")]
    VideoSpeed {
        speed: f64,
        enabled: bool,
        #[serde(default)]
        apply_to_shorts: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    SubtitlesPreference {
        language: SubtitleLanguage,
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    AudioNormalizer {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        value: Option<NormalizerPreset>,
        #[serde(default)]
        manual_activation: Option<bool>,
        #[serde(default)]
        custom_settings: Option<CompressorSettings>,
        #[serde(default)]
        toggle_state: Option<bool>,
    },
    Volume {
        #[serde(deserialize_with = "volume_level")]
        value: u32,
        enabled: bool,
    },
    AudioTrack { language: AudioLanguage, enabled: bool },
    HideMembersOnlyVideos { enabled: bool },
    HideShorts { enabled: bool },
}

impl FeatureUpdate {
    pub fn feature(&self) -> Feature {
        match self {
            Self::VideoQuality { .. } => Feature::VideoQuality,
            Self::VideoSpeed { .. } => Feature::VideoSpeed,
            Self::SubtitlesPreference { .. } => Feature::Subtitles,
            Self::AudioNormalizer { .. } => Feature::AudioNormalizer,
            Self::Volume { .. } => Feature::Volume,
            Self::AudioTrack { .. } => Feature::AudioTrack,
            Self::HideMembersOnlyVideos { .. } => Feature::HideMembersOnly,
            Self::HideShorts { .. } => Feature::HideShorts,
        }
    }

    /// Build the snapshot that results from this update. `base` is left untouched.
    pub fn applied_to(&self, base: &ExtensionSettings) -> ExtensionSettings {
        let mut next = base.clone();
        match self {
            Self::VideoQuality { quality, enabled } => {
                next.video_quality.value = *quality;
                next.video_quality.enabled = *enabled;
            }
            Self::VideoSpeed {
                speed,
                enabled,
                apply_to_shorts,
            } => {
                next.video_speed.value = *speed;
                next.video_speed.enabled = *enabled;
                if let Some(apply) = apply_to_shorts {
                    next.video_speed.apply_to_shorts = *apply;
                }
            }
            Self::SubtitlesPreference { language, enabled } => {
                next.subtitles_preference.value = language.clone();
                next.subtitles_preference.enabled = *enabled;
            }
            Self::AudioNormalizer {
                enabled,
                value,
                manual_activation,
                custom_settings,
                toggle_state,
            } => {
                let normalizer = &mut next.audio_normalizer;
                if let Some(enabled) = enabled {
                    normalizer.enabled = *enabled;
                }
                if let Some(value) = value {
                    normalizer.value = *value;
                }
                if let Some(manual) = manual_activation {
                    normalizer.manual_activation = *manual;
                    // Switching modes always starts from "off"
                    normalizer.active = Some(false);
                }
                if let Some(custom) = custom_settings {
                    normalizer.custom_settings = Some(*custom);
                }
                if let Some(toggle) = toggle_state {
                    normalizer.active = Some(*toggle);
                }
            }
            Self::Volume { value, enabled } => {
                next.volume.value = *value;
                next.volume.enabled = *enabled;
            }
            Self::AudioTrack { language, enabled } => {
                next.audio_track.language = language.clone();
                next.audio_track.enabled = *enabled;
            }
            Self::HideMembersOnlyVideos { enabled } => {
                next.hide_members_only_videos.enabled = *enabled;
            }
            Self::HideShorts { enabled } => {
                next.hide_shorts.enabled = *enabled;
            }
        }
        next
    }
}

/// A validated runtime message.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeMessage {
    /// Full snapshot replacement.
    UpdateSettings(Box<ExtensionSettings>),
    /// Single-feature update.
    Feature(FeatureUpdate),
}

impl RuntimeMessage {
    /// Validate an untyped message at the boundary.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let object = value.as_object().ok_or(MessageError::NotAnObject)?;

        if let Some(action) = object.get("action") {
            return match action.as_str() {
                Some("updateSettings") => {
                    let raw = object
                        .get("settings")
                        .filter(|s| s.is_object())
                        .ok_or(MessageError::UnknownShape)?;
                    // Popup snapshots go through the same repair as stored ones
                    let (settings, _) = decode_settings(raw);
                    Ok(Self::UpdateSettings(Box::new(settings)))
                }
                Some(other) => Err(MessageError::UnknownAction(other.to_string())),
                None => Err(MessageError::UnknownShape),
            };
        }

        if object.contains_key("feature") {
            return serde_json::from_value::<FeatureUpdate>(value.clone())
                .map(Self::Feature)
                .map_err(|source| MessageError::Invalid {
                    kind: "feature",
                    source,
                });
        }

        Err(MessageError::UnknownShape)
    }
}

// =============================================================================
// Page messages (content script -> page context)
// =============================================================================

/// Broadcast into the page context with `window.postMessage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(tag = "type")]
pub enum PageMessage {
    #[serde(rename = "SETTINGS_UPDATE")]
    SettingsUpdate { settings: ExtensionSettings },
    #[serde(rename = "AUDIO_NORMALIZER_UPDATE", rename_all = "camelCase")]
    AudioNormalizerUpdate { toggle_state: bool },
}
