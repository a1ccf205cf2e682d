//! Subtitle track selection
//!
//! Auto-generated (ASR) tracks are always in the video's spoken language, so
//! the ASR track tells us what "original" means for a video.

use serde::Deserialize;

use super::{Player, PlayerError};
use crate::retry::{retry, RetryPolicy, Sleep};
use crate::settings::SubtitleLanguage;

const ASR_KIND: &str = "asr";

/// Entry of `captions.playerCaptionsTracklistRenderer.captionTracks`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    #[serde(default)]
    pub kind: Option<String>,
    pub language_code: String,
    #[serde(default, deserialize_with = "simple_text")]
    pub name: Option<String>,
}

impl CaptionTrack {
    pub fn is_asr(&self) -> bool {
        self.kind.as_deref() == Some(ASR_KIND)
    }

    /// Manual tracks carry no `kind`.
    pub fn is_manual(&self) -> bool {
        self.kind.as_deref().map_or(true, str::is_empty)
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.language_code)
    }
}

/// Track names come as `{simpleText: "..."}`.
fn simple_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Name {
        simple_text: Option<String>,
    }
    Ok(Option::<Name>::deserialize(deserializer)?.and_then(|n| n.simple_text))
}

/// The track to enable, or `None` to turn captions off.
pub fn select_caption_track<'a>(preference: &SubtitleLanguage, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
    match preference {
        SubtitleLanguage::Disabled => None,
        SubtitleLanguage::Original => {
            let asr = tracks.iter().find(|t| t.is_asr())?;
            tracks
                .iter()
                .find(|t| t.is_manual() && t.language_code == asr.language_code)
        }
        SubtitleLanguage::Code(code) => tracks.iter().find(|t| t.is_manual() && &t.language_code == code),
    }
}

/// Select and set the caption track, retrying while the player API throws.
pub async fn apply_subtitles<P, Z>(
    player: &P,
    preference: &SubtitleLanguage,
    policy: RetryPolicy,
    sleeper: &Z,
) -> Result<Option<CaptionTrack>, PlayerError>
where
    P: Player,
    Z: Sleep,
{
    let result = retry(policy, sleeper, |_| -> Result<Option<CaptionTrack>, PlayerError> {
        if *preference == SubtitleLanguage::Disabled {
            player.set_caption_track(None)?;
            return Ok(None);
        }
        let tracks = player.caption_tracks()?;
        let choice = select_caption_track(preference, &tracks).cloned();
        player.set_caption_track(choice.as_ref())?;
        Ok(choice)
    })
    .await
    .map_err(|e| e.into_last());

    match &result {
        Ok(Some(track)) => {
            log::info!(target: "ycs::subtitles", "Setting subtitles to: \"{}\"", track.display_name());
        }
        Ok(None) => log::info!(target: "ycs::subtitles", "No matching track, disabling subtitles"),
        Err(e) => log::error!(target: "ycs::subtitles", "Failed to set subtitles: {}", e),
    }
    result
}
