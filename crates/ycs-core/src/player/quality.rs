//! Video quality selection

use super::Player;
use crate::settings::{Quality, VideoQualitySetting};

/// Result of applying the quality preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityOutcome {
    /// Preference is `auto`; the player chooses.
    Unrestricted,
    AlreadySet(Quality),
    Set(Quality),
    /// No usable quality list or setter.
    Unavailable,
}

/// Pick the quality to use for `preferred` given what the video offers.
///
/// Exact match first, then the nearest lower rung, then the lowest rung the
/// video offers. `None` only when nothing is available.
pub fn closest_available_quality(preferred: Quality, available: &[Quality]) -> Option<Quality> {
    if available.contains(&preferred) {
        return Some(preferred);
    }
    let Some(rank) = preferred.rank() else {
        return available.first().copied();
    };
    if let Some(lower) = Quality::LADDER[..rank].iter().rev().find(|q| available.contains(q)) {
        return Some(*lower);
    }
    available
        .iter()
        .filter_map(|q| q.rank().map(|r| (r, *q)))
        .min_by_key(|(r, _)| *r)
        .map(|(_, q)| q)
        .or_else(|| available.first().copied())
}

/// First entry of a custom priority order the video offers, else the player's first choice.
pub fn preferred_available_quality(order: &[Quality], available: &[Quality]) -> Option<Quality> {
    order
        .iter()
        .find(|q| available.contains(q))
        .or_else(|| available.first())
        .copied()
}

/// Player-reported quality strings, unknown identifiers dropped.
fn available_levels<P: Player>(player: &P) -> Option<Vec<Quality>> {
    let levels = player.available_quality_levels()?;
    Some(levels.iter().filter_map(|s| Quality::parse(s)).collect())
}

pub fn apply_quality<P: Player>(player: &P, setting: &VideoQualitySetting) -> QualityOutcome {
    let custom = setting
        .custom_order
        .as_ref()
        .filter(|order| order.enabled && !order.order.is_empty());

    if custom.is_none() && setting.value == Quality::Auto {
        log::info!(target: "ycs::quality", "Setting quality to auto (not restricting)");
        return QualityOutcome::Unrestricted;
    }

    let Some(available) = available_levels(player) else {
        log::error!(target: "ycs::quality", "Player does not support quality listing");
        return QualityOutcome::Unavailable;
    };

    let choice = match custom {
        Some(order) => preferred_available_quality(&order.order, &available),
        None => closest_available_quality(setting.value, &available),
    };
    let Some(quality) = choice else {
        log::error!(target: "ycs::quality", "No available quality to set");
        return QualityOutcome::Unavailable;
    };

    if custom.is_some() && player.playback_quality().as_deref() == Some(quality.as_str()) {
        log::info!(target: "ycs::quality", "Quality already set to: {}", quality.label());
        return QualityOutcome::AlreadySet(quality);
    }

    if player.set_playback_quality_range(quality) {
        log::info!(target: "ycs::quality", "Quality set to: {}", quality.label());
        QualityOutcome::Set(quality)
    } else {
        QualityOutcome::Unavailable
    }
}
