//! Playback speed

use super::Player;
use crate::settings::{DurationRuleType, VideoSpeedSetting};

/// Range the player API accepts; anything outside goes to the `<video>` element.
pub const API_MIN_RATE: f64 = 0.25;
pub const API_MAX_RATE: f64 = 2.0;

const DEFAULT_RULE_MINUTES: u32 = 60;

/// What the page knows about the current video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFacts {
    pub is_live: bool,
    /// Seconds; unknown while metadata loads.
    pub duration: Option<f64>,
    pub api_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedPlan {
    /// Live streams keep their speed.
    Leave,
    /// The duration rule matched; play at 1x.
    Reset,
    ViaApi(f64),
    ViaElement(f64),
}

/// Whether the duration rule excludes a video of `duration` seconds.
fn duration_rule_matches(setting: &VideoSpeedSetting, duration: Option<f64>) -> bool {
    if setting.duration_rule_enabled != Some(true) {
        return false;
    }
    let Some(seconds) = duration.filter(|d| d.is_finite()) else {
        return false;
    };
    let minutes = seconds / 60.0;
    let threshold = f64::from(setting.duration_rule_minutes.unwrap_or(DEFAULT_RULE_MINUTES));
    match setting.duration_rule_type.unwrap_or(DurationRuleType::Greater) {
        DurationRuleType::Greater => minutes > threshold,
        DurationRuleType::Less => minutes < threshold,
    }
}

pub fn plan_speed(setting: &VideoSpeedSetting, facts: SpeedFacts) -> SpeedPlan {
    if facts.is_live {
        return SpeedPlan::Leave;
    }
    if duration_rule_matches(setting, facts.duration) {
        return SpeedPlan::Reset;
    }
    let rate = setting.value;
    if !(API_MIN_RATE..=API_MAX_RATE).contains(&rate) || !facts.api_available {
        SpeedPlan::ViaElement(rate)
    } else {
        SpeedPlan::ViaApi(rate)
    }
}

/// Plan and carry out the speed change. Returns the plan that was executed.
pub fn apply_speed<P: Player>(player: &P, setting: &VideoSpeedSetting) -> Option<SpeedPlan> {
    let facts = SpeedFacts {
        is_live: player.is_live(),
        duration: player.duration(),
        api_available: player.supports_playback_rate(),
    };
    let plan = plan_speed(setting, facts);
    let done = match plan {
        SpeedPlan::Leave => {
            log::info!(target: "ycs::speed", "Not changing speed for live stream");
            true
        }
        SpeedPlan::Reset => {
            log::info!(target: "ycs::speed", "Duration rule matched, not applying speed (using x1)");
            player.set_element_playback_rate(1.0)
        }
        SpeedPlan::ViaApi(rate) => {
            log::info!(target: "ycs::speed", "Playback speed set to (via player API): {}", rate);
            player.set_playback_rate(rate)
        }
        SpeedPlan::ViaElement(rate) => {
            log::info!(target: "ycs::speed", "Playback speed set to (via video element): {}", rate);
            player.set_element_playback_rate(rate)
        }
    };
    if done {
        Some(plan)
    } else {
        log::error!(target: "ycs::speed", "Video element not found");
        None
    }
}
