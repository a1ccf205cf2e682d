//! Default volume

use super::Player;
use crate::settings::VolumeSetting;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeOutcome {
    Unchanged(f64),
    Set(f64),
    Unavailable,
}

/// Volume preference clamped to the player's scale.
pub fn target_volume(setting: &VolumeSetting) -> f64 {
    f64::from(setting.value.min(100))
}

pub fn apply_volume<P: Player>(player: &P, setting: &VolumeSetting) -> VolumeOutcome {
    let target = target_volume(setting);
    let Some(current) = player.volume() else {
        return VolumeOutcome::Unavailable;
    };
    if (current - target).abs() < f64::EPSILON {
        log::debug!(target: "ycs::volume", "Volume already at default value: {}", target);
        return VolumeOutcome::Unchanged(target);
    }
    if player.set_volume(target) {
        log::info!(target: "ycs::volume", "Default volume set: {}", target);
        VolumeOutcome::Set(target)
    } else {
        VolumeOutcome::Unavailable
    }
}
