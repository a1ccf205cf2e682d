//! Shared type definitions for YouTube Control Suite
//!
//! Features, their page-context scripts, and the timestamp unit used by the
//! observation layer.

use std::fmt;

/// Milliseconds on the host's monotonic-enough clock (`Date.now()` in the browser).
pub type Millis = u64;

// =============================================================================
// Features
// =============================================================================

/// A capability governed by one sub-record of `ExtensionSettings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    VideoQuality,
    VideoSpeed,
    Subtitles,
    AudioNormalizer,
    Volume,
    AudioTrack,
    HideMembersOnly,
    HideShorts,
}

impl Feature {
    /// Features that act on the video element and are re-applied on every new source.
    pub const PLAYER: [Feature; 6] = [
        Feature::VideoQuality,
        Feature::VideoSpeed,
        Feature::Subtitles,
        Feature::AudioNormalizer,
        Feature::Volume,
        Feature::AudioTrack,
    ];

    pub const ALL: [Feature; 8] = [
        Feature::VideoQuality,
        Feature::VideoSpeed,
        Feature::Subtitles,
        Feature::AudioNormalizer,
        Feature::Volume,
        Feature::AudioTrack,
        Feature::HideMembersOnly,
        Feature::HideShorts,
    ];

    /// Key of the feature's sub-record in the settings JSON.
    pub fn key(self) -> &'static str {
        match self {
            Self::VideoQuality => "videoQuality",
            Self::VideoSpeed => "videoSpeed",
            Self::Subtitles => "subtitlesPreference",
            Self::AudioNormalizer => "audioNormalizer",
            Self::Volume => "volume",
            Self::AudioTrack => "audioTrack",
            Self::HideMembersOnly => "hideMembersOnlyVideos",
            Self::HideShorts => "hideShorts",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Page-context script carrying the feature, if it has one.
    /// Shorts hiding runs entirely on the content-script side.
    pub fn script(self) -> Option<PageScript> {
        match self {
            Self::VideoQuality => Some(PageScript::VideoQuality),
            Self::VideoSpeed => Some(PageScript::VideoSpeed),
            Self::Subtitles => Some(PageScript::Subtitles),
            Self::AudioNormalizer => Some(PageScript::AudioNormalizer),
            Self::Volume => Some(PageScript::Volume),
            Self::AudioTrack => Some(PageScript::AudioTrack),
            Self::HideMembersOnly => Some(PageScript::MembersFetchInterceptor),
            Self::HideShorts => None,
        }
    }

    /// Log target for this feature.
    pub fn log_target(self) -> &'static str {
        match self {
            Self::VideoQuality => "ycs::quality",
            Self::VideoSpeed => "ycs::speed",
            Self::Subtitles => "ycs::subtitles",
            Self::AudioNormalizer => "ycs::normalizer",
            Self::Volume => "ycs::volume",
            Self::AudioTrack => "ycs::audio_track",
            Self::HideMembersOnly => "ycs::members",
            Self::HideShorts => "ycs::shorts",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Page scripts
// =============================================================================

/// How long an injected script stays active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Runs once against the current player and removes itself.
    OneShot,
    /// Installs listeners and lives for the page lifetime.
    Persistent,
}

/// Injectable page-context script, one per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageScript {
    VideoQuality,
    VideoSpeed,
    Subtitles,
    AudioNormalizer,
    Volume,
    AudioTrack,
    MembersFetchInterceptor,
}

impl PageScript {
    /// Extension-relative path of the bundled script.
    pub fn path(self) -> &'static str {
        match self {
            Self::VideoQuality => "dist/content/scripts/VideoQualityScript.js",
            Self::VideoSpeed => "dist/content/scripts/VideoSpeedScript.js",
            Self::Subtitles => "dist/content/scripts/SubtitlesScript.js",
            Self::AudioNormalizer => "dist/content/scripts/AudioNormalizerScript.js",
            Self::Volume => "dist/content/scripts/VolumeScript.js",
            Self::AudioTrack => "dist/content/scripts/AudioTrackScript.js",
            Self::MembersFetchInterceptor => "dist/content/scripts/MembersFetchInterceptorScript.js",
        }
    }

    pub fn mode(self) -> ScriptMode {
        match self {
            Self::AudioNormalizer | Self::MembersFetchInterceptor => ScriptMode::Persistent,
            _ => ScriptMode::OneShot,
        }
    }
}
