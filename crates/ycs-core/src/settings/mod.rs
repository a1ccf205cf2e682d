//! Extension settings model
//!
//! One sub-record per feature, serialized with the camelCase keys the popup and
//! the page-context scripts read. A snapshot is never edited in place: updates
//! build a new `ExtensionSettings` and the orchestrator swaps it in whole.

mod migrate;

pub use migrate::{migrate, Migration};

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Feature;

#[cfg(feature = "ts")]
use ts_rs::TS;

// =============================================================================
// Quality
// =============================================================================

/// YouTube playback quality identifiers, in the player's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Auto,
    Tiny,
    Small,
    Medium,
    Large,
    Hd720,
    Hd1080,
    Hd1440,
    Hd2160,
    Highres,
}

impl Quality {
    /// Concrete qualities from lowest to highest. `Auto` is not part of the ladder.
    pub const LADDER: [Quality; 9] = [
        Quality::Tiny,
        Quality::Small,
        Quality::Medium,
        Quality::Large,
        Quality::Hd720,
        Quality::Hd1080,
        Quality::Hd1440,
        Quality::Hd2160,
        Quality::Highres,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Hd720 => "hd720",
            Self::Hd1080 => "hd1080",
            Self::Hd1440 => "hd1440",
            Self::Hd2160 => "hd2160",
            Self::Highres => "highres",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "tiny" => Some(Self::Tiny),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "hd720" => Some(Self::Hd720),
            "hd1080" => Some(Self::Hd1080),
            "hd1440" => Some(Self::Hd1440),
            "hd2160" => Some(Self::Hd2160),
            "highres" => Some(Self::Highres),
            _ => None,
        }
    }

    /// Position on the ladder, `None` for `Auto`.
    pub fn rank(self) -> Option<usize> {
        Self::LADDER.iter().position(|q| *q == self)
    }

    /// Human label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tiny => "144p",
            Self::Small => "240p",
            Self::Medium => "360p",
            Self::Large => "480p",
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
            Self::Hd1440 => "2K",
            Self::Hd2160 => "4K",
            Self::Highres => "8K",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Language preferences
// =============================================================================

/// Subtitle language preference: `original`, `disabled` or an ISO 639-1 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubtitleLanguage {
    Original,
    Disabled,
    Code(String),
}

impl From<String> for SubtitleLanguage {
    fn from(value: String) -> Self {
        match value.as_str() {
            "original" => Self::Original,
            "disabled" => Self::Disabled,
            _ => Self::Code(value),
        }
    }
}

impl From<SubtitleLanguage> for String {
    fn from(value: SubtitleLanguage) -> Self {
        match value {
            SubtitleLanguage::Original => "original".to_string(),
            SubtitleLanguage::Disabled => "disabled".to_string(),
            SubtitleLanguage::Code(code) => code,
        }
    }
}

/// Audio track language preference: `original` or an ISO 639-1 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AudioLanguage {
    Original,
    Code(String),
}

impl From<String> for AudioLanguage {
    fn from(value: String) -> Self {
        if value == "original" {
            Self::Original
        } else {
            Self::Code(value)
        }
    }
}

impl From<AudioLanguage> for String {
    fn from(value: AudioLanguage) -> Self {
        match value {
            AudioLanguage::Original => "original".to_string(),
            AudioLanguage::Code(code) => code,
        }
    }
}

// =============================================================================
// Feature sub-records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct CustomOrder {
    pub enabled: bool,
    pub order: Vec<Quality>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct VideoQualitySetting {
    pub enabled: bool,
    pub value: Quality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_order: Option<CustomOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum DurationRuleType {
    /// Skip the speed for videos longer than the threshold.
    Greater,
    /// Skip the speed for videos shorter than the threshold.
    Less,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct VideoSpeedSetting {
    pub enabled: bool,
    pub value: f64,
    pub apply_to_shorts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_rule_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_rule_type: Option<DurationRuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_rule_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct SubtitlesSetting {
    pub enabled: bool,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub value: SubtitleLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum NormalizerPreset {
    Light,
    Medium,
    Strong,
    Custom,
}

/// Compressor parameters. `threshold` is in dBFS, `attack`/`release` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct CompressorSettings {
    pub threshold: f64,
    pub boost: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AudioNormalizerSetting {
    pub enabled: bool,
    pub value: NormalizerPreset,
    pub manual_activation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_settings: Option<CompressorSettings>,
    /// Runtime only: manually toggled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Runtime only: volume saved before processing started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct VolumeSetting {
    pub enabled: bool,
    /// 0–100. Stored fractions are rounded and out-of-range values clamped.
    #[serde(deserialize_with = "volume_level")]
    pub value: u32,
}

pub(crate) fn volume_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let level = f64::deserialize(deserializer)?;
    if !level.is_finite() {
        return Err(serde::de::Error::custom("volume is not a finite number"));
    }
    Ok(level.round().clamp(0.0, 100.0) as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct ToggleSetting {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct AudioTrackSetting {
    pub enabled: bool,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub language: AudioLanguage,
}

// =============================================================================
// Top-level record
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    pub video_quality: VideoQualitySetting,
    pub video_speed: VideoSpeedSetting,
    pub subtitles_preference: SubtitlesSetting,
    pub audio_normalizer: AudioNormalizerSetting,
    pub volume: VolumeSetting,
    pub hide_members_only_videos: ToggleSetting,
    pub hide_shorts: ToggleSetting,
    pub audio_track: AudioTrackSetting,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            video_quality: VideoQualitySetting {
                enabled: false,
                value: Quality::Hd2160,
                custom_order: None,
            },
            video_speed: VideoSpeedSetting {
                enabled: false,
                value: 1.0,
                apply_to_shorts: true,
                duration_rule_enabled: None,
                duration_rule_type: None,
                duration_rule_minutes: None,
            },
            subtitles_preference: SubtitlesSetting {
                enabled: false,
                value: SubtitleLanguage::Original,
            },
            audio_normalizer: AudioNormalizerSetting {
                enabled: false,
                value: NormalizerPreset::Custom,
                manual_activation: true,
                custom_settings: Some(CompressorSettings {
                    threshold: -30.0,
                    boost: 1.2,
                    ratio: 4.0,
                    attack: 0.01,
                    release: 0.25,
                }),
                active: None,
                user_volume: None,
            },
            volume: VolumeSetting {
                enabled: false,
                value: 50,
            },
            hide_members_only_videos: ToggleSetting { enabled: false },
            hide_shorts: ToggleSetting { enabled: false },
            audio_track: AudioTrackSetting {
                enabled: false,
                language: AudioLanguage::Original,
            },
        }
    }
}

impl ExtensionSettings {
    /// Schema default as JSON, the reference record for migration.
    pub fn default_value() -> serde_json::Value {
        serde_json::to_value(Self::default()).unwrap_or_default()
    }

    /// True when any feature that acts on the video element is enabled.
    pub fn any_player_feature_enabled(&self) -> bool {
        self.video_quality.enabled
            || self.video_speed.enabled
            || self.subtitles_preference.enabled
            || self.audio_normalizer.enabled
            || self.volume.enabled
            || self.audio_track.enabled
    }

    /// True when any DOM content filter is enabled.
    pub fn any_filter_enabled(&self) -> bool {
        self.hide_members_only_videos.enabled || self.hide_shorts.enabled
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::VideoQuality => self.video_quality.enabled,
            Feature::VideoSpeed => self.video_speed.enabled,
            Feature::Subtitles => self.subtitles_preference.enabled,
            Feature::AudioNormalizer => self.audio_normalizer.enabled,
            Feature::Volume => self.volume.enabled,
            Feature::AudioTrack => self.audio_track.enabled,
            Feature::HideMembersOnly => self.hide_members_only_videos.enabled,
            Feature::HideShorts => self.hide_shorts.enabled,
        }
    }
}
