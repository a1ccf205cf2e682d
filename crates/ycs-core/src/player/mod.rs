//! Page-context player logic
//!
//! Decision logic of the injected page scripts, written against a `Player`
//! trait so it runs the same over the real YouTube player object and over a
//! test double. Methods that YouTube may not expose on a given player build
//! return `Option`/`bool`; calls that can throw while the player warms up
//! return `Result` and go through the bounded retry helper.
//!
//! Each feature reads its sub-record from the composite page-store blob, the
//! same JSON the preference bridge writes.

pub mod audio_track;
pub mod normalizer;
pub mod quality;
pub mod speed;
pub mod subtitles;
pub mod volume;

pub use audio_track::{apply_audio_track, select_audio_track, AudioTrackChoice};
pub use normalizer::{Compressor, NormalizerSession};
pub use quality::{apply_quality, closest_available_quality, preferred_available_quality, QualityOutcome};
pub use speed::{apply_speed, plan_speed, SpeedFacts, SpeedPlan};
pub use subtitles::{apply_subtitles, select_caption_track, CaptionTrack};
pub use volume::{apply_volume, VolumeOutcome};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::retry::{retry, RetryPolicy, Sleep};
use crate::settings::Quality;
use crate::types::Feature;
use crate::url::PageKind;

/// Error type for player API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("Player method {0} is not available")]
    Missing(&'static str),
    #[error("Player call failed: {0}")]
    Call(String),
}

/// The YouTube player element's JS API.
pub trait Player {
    /// Quality identifiers the current video offers, highest first.
    fn available_quality_levels(&self) -> Option<Vec<String>>;
    fn playback_quality(&self) -> Option<String>;
    /// Pin quality to exactly `quality`. False when the API is missing.
    fn set_playback_quality_range(&self, quality: Quality) -> bool;

    fn is_live(&self) -> bool;
    /// Video duration in seconds.
    fn duration(&self) -> Option<f64>;
    fn supports_playback_rate(&self) -> bool;
    fn set_playback_rate(&self, rate: f64) -> bool;
    /// Set `playbackRate` on the `<video>` element directly.
    fn set_element_playback_rate(&self, rate: f64) -> bool;

    fn caption_tracks(&self) -> Result<Vec<CaptionTrack>, PlayerError>;
    /// `None` turns captions off.
    fn set_caption_track(&self, track: Option<&CaptionTrack>) -> Result<(), PlayerError>;

    /// Ids of the available audio tracks.
    fn audio_tracks(&self) -> Result<Vec<String>, PlayerError>;
    fn current_audio_track(&self) -> Option<String>;
    fn set_audio_track(&self, id: &str) -> Result<(), PlayerError>;

    /// Volume on the player's 0–100 scale.
    fn volume(&self) -> Option<f64>;
    fn set_volume(&self, volume: f64) -> bool;
}

/// Which player element drives the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTarget {
    Watch,
    Shorts,
    /// Featured video on a channel page.
    Channel,
}

impl PlayerTarget {
    pub fn for_page(kind: PageKind) -> Self {
        match kind {
            PageKind::Shorts => Self::Shorts,
            PageKind::Channel => Self::Channel,
            _ => Self::Watch,
        }
    }

    pub fn element_id(self) -> &'static str {
        match self {
            Self::Watch => "movie_player",
            Self::Shorts => "shorts-player",
            Self::Channel => "c4-player",
        }
    }
}

/// Finds the player element in the page.
pub trait PlayerLocator {
    type Player: Player;

    fn find(&self, target: PlayerTarget) -> Option<Self::Player>;
}

/// Poll for the player until it appears or the policy gives up.
pub async fn locate_player<L, Z>(locator: &L, kind: PageKind, policy: RetryPolicy, sleeper: &Z) -> Option<L::Player>
where
    L: PlayerLocator,
    Z: Sleep,
{
    let target = PlayerTarget::for_page(kind);
    match retry(policy, sleeper, |_| locator.find(target).ok_or(())).await {
        Ok(player) => Some(player),
        Err(e) => {
            log::warn!(target: "ycs::core", "Player #{} not found: {}", target.element_id(), e);
            None
        }
    }
}

/// Decode one feature's sub-record from the page-store blob.
pub fn feature_setting<T: DeserializeOwned>(blob: &Map<String, Value>, feature: Feature) -> Option<T> {
    let record = blob.get(feature.key())?;
    match serde_json::from_value(record.clone()) {
        Ok(setting) => Some(setting),
        Err(e) => {
            log::error!(target: feature.log_target(), "Unreadable {} record in page store: {}", feature, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use crate::settings::VolumeSetting;
    use crate::testing::{FakePlayer, RecordingSleep};
    use serde_json::json;
    use std::cell::Cell;

    struct LateLocator {
        calls: Cell<u32>,
        ready_after: u32,
    }

    impl PlayerLocator for LateLocator {
        type Player = FakePlayer;

        fn find(&self, target: PlayerTarget) -> Option<FakePlayer> {
            assert_eq!(target, PlayerTarget::Shorts);
            self.calls.set(self.calls.get() + 1);
            (self.calls.get() >= self.ready_after).then(FakePlayer::default)
        }
    }

    #[tokio::test]
    async fn test_locate_player_polls() {
        let locator = LateLocator {
            calls: Cell::new(0),
            ready_after: 3,
        };
        let sleeper = RecordingSleep::default();
        let player = locate_player(&locator, PageKind::Shorts, RetryPolicy::PLAYER_POLL, &sleeper).await;
        assert!(player.is_some());
        assert_eq!(sleeper.delays(), vec![200, 200]);
    }

    #[tokio::test]
    async fn test_locate_player_gives_up() {
        let locator = LateLocator {
            calls: Cell::new(0),
            ready_after: u32::MAX,
        };
        let sleeper = RecordingSleep::default();
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff: Backoff::Fixed(200),
        };
        assert!(locate_player(&locator, PageKind::Shorts, policy, &sleeper).await.is_none());
        assert_eq!(locator.calls.get(), 4);
    }

    #[test]
    fn test_player_targets() {
        assert_eq!(PlayerTarget::for_page(PageKind::Watch).element_id(), "movie_player");
        assert_eq!(PlayerTarget::for_page(PageKind::Shorts).element_id(), "shorts-player");
        assert_eq!(PlayerTarget::for_page(PageKind::Channel).element_id(), "c4-player");
    }

    #[test]
    fn test_feature_setting() {
        let blob = json!({"volume": {"enabled": true, "value": 20}, "videoSpeed": "garbage"});
        let blob = blob.as_object().unwrap();
        let volume: Option<VolumeSetting> = feature_setting(blob, Feature::Volume);
        assert_eq!(volume, Some(VolumeSetting { enabled: true, value: 20 }));
        let speed: Option<crate::settings::VideoSpeedSetting> = feature_setting(blob, Feature::VideoSpeed);
        assert!(speed.is_none());
    }
}
