//! Audio track selection
//!
//! Track ids look like `<n>;<base64>`. The decoded payload names the language
//! (`lang..<code>`) and marks the original-language track with `original`,
//! which keeps selection independent of the UI language.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Player, PlayerError};
use crate::retry::{retry, RetryPolicy, Sleep};
use crate::settings::AudioLanguage;

static LANG_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"lang..([-a-zA-Z]+)").ok());

const ORIGINAL_MARKER: &str = "original";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioTrackChoice {
    /// Zero or one track; nothing to choose.
    Single,
    AlreadySelected,
    Select(String),
    NotAvailable,
}

/// Decoded payload of a track id.
pub fn decode_track_id(id: &str) -> Option<String> {
    let payload = id.split(';').nth(1)?;
    let bytes = BASE64_STANDARD.decode(payload.trim()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Primary language subtag of a track (`en` for `en-US`).
pub fn track_language(id: &str) -> Option<String> {
    let decoded = decode_track_id(id)?;
    let pattern = LANG_PATTERN.as_ref()?;
    let code = pattern.captures(&decoded)?.get(1)?.as_str();
    code.split('-').next().map(str::to_string)
}

pub fn is_original_track(id: &str) -> bool {
    decode_track_id(id).is_some_and(|decoded| decoded.contains(ORIGINAL_MARKER))
}

fn matches(preference: &AudioLanguage, id: &str) -> bool {
    match preference {
        AudioLanguage::Original => is_original_track(id),
        AudioLanguage::Code(code) => track_language(id).as_deref() == Some(code.as_str()),
    }
}

pub fn select_audio_track(preference: &AudioLanguage, tracks: &[String], current: Option<&str>) -> AudioTrackChoice {
    if tracks.len() <= 1 {
        return AudioTrackChoice::Single;
    }
    if current.is_some_and(|id| matches(preference, id)) {
        return AudioTrackChoice::AlreadySelected;
    }
    match tracks.iter().find(|id| matches(preference, id)) {
        Some(id) => AudioTrackChoice::Select(id.clone()),
        None => AudioTrackChoice::NotAvailable,
    }
}

/// Select and set the audio track, retrying while the player API throws.
pub async fn apply_audio_track<P, Z>(
    player: &P,
    preference: &AudioLanguage,
    policy: RetryPolicy,
    sleeper: &Z,
) -> Result<AudioTrackChoice, PlayerError>
where
    P: Player,
    Z: Sleep,
{
    let result = retry(policy, sleeper, |_| -> Result<AudioTrackChoice, PlayerError> {
        let tracks = player.audio_tracks()?;
        let current = player.current_audio_track();
        let choice = select_audio_track(preference, &tracks, current.as_deref());
        if let AudioTrackChoice::Select(id) = &choice {
            player.set_audio_track(id)?;
        }
        Ok(choice)
    })
    .await
    .map_err(|e| e.into_last());

    match &result {
        Ok(AudioTrackChoice::Single) => {
            log::info!(target: "ycs::audio_track", "Only one audio track available, no change needed")
        }
        Ok(AudioTrackChoice::AlreadySelected) => {
            log::info!(target: "ycs::audio_track", "Audio already in preferred language")
        }
        Ok(AudioTrackChoice::Select(id)) => log::info!(
            target: "ycs::audio_track",
            "Setting audio to: {}",
            track_language(id).unwrap_or_else(|| "unknown".to_string())
        ),
        Ok(AudioTrackChoice::NotAvailable) => {
            log::info!(target: "ycs::audio_track", "Selected language \"{}\" not available", String::from(preference.clone()))
        }
        Err(e) => log::error!(target: "ycs::audio_track", "Failed to set audio track: {}", e),
    }
    result
}
