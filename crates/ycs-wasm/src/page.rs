//! Page-context entry points
//!
//! Each injected feature script loads this module and calls one of the
//! `run*Script` functions. They read the composite blob from `localStorage`,
//! find the YouTube player element and hand it to the core decision logic.

use js_sys::{Array, Function, Object, Reflect};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlMediaElement};

use ycs_core::player::{
    apply_audio_track, apply_quality, apply_speed, apply_subtitles, apply_volume, feature_setting, locate_player,
    CaptionTrack, NormalizerSession, Player, PlayerError, PlayerLocator, PlayerTarget,
};
use ycs_core::retry::RetryPolicy;
use ycs_core::settings::{AudioNormalizerSetting, AudioTrackSetting, SubtitlesSetting, VideoQualitySetting, VideoSpeedSetting, VolumeSetting};
use ycs_core::{Feature, PageKind, Quality, StoreConfig};

use crate::browser::{describe, from_js, to_js, window, TimeoutSleep};

// =============================================================================
// Player object
// =============================================================================

/// The `#movie_player` element and its JS API.
pub struct JsPlayer {
    element: Element,
}

impl JsPlayer {
    fn method(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.element, &JsValue::from_str(name)).ok()?.dyn_into().ok()
    }

    fn call(&self, name: &'static str, args: &Array) -> Result<JsValue, PlayerError> {
        let function = self.method(name).ok_or(PlayerError::Missing(name))?;
        function
            .apply(&self.element, args)
            .map_err(|e| PlayerError::Call(describe(&e)))
    }

    fn video(&self) -> Option<HtmlMediaElement> {
        self.element.query_selector("video").ok()??.dyn_into().ok()
    }

    fn track_id(track: &JsValue) -> Option<String> {
        Reflect::get(track, &"id".into()).ok()?.as_string()
    }

    fn audio_track_objects(&self) -> Result<Array, PlayerError> {
        let tracks = self.call("getAvailableAudioTracks", &Array::new())?;
        Ok(if Array::is_array(&tracks) {
            tracks.unchecked_into()
        } else {
            Array::new()
        })
    }
}

fn property(value: &JsValue, path: &[&str]) -> Option<JsValue> {
    let mut current = value.clone();
    for key in path {
        if current.is_undefined() || current.is_null() {
            return None;
        }
        current = Reflect::get(&current, &JsValue::from_str(key)).ok()?;
    }
    (!current.is_undefined() && !current.is_null()).then_some(current)
}

impl Player for JsPlayer {
    fn available_quality_levels(&self) -> Option<Vec<String>> {
        let levels = self.call("getAvailableQualityLevels", &Array::new()).ok()?;
        Array::is_array(&levels).then(|| Array::from(&levels).iter().filter_map(|q| q.as_string()).collect())
    }

    fn playback_quality(&self) -> Option<String> {
        self.call("getPlaybackQuality", &Array::new()).ok()?.as_string()
    }

    fn set_playback_quality_range(&self, quality: Quality) -> bool {
        let q = JsValue::from_str(quality.as_str());
        self.call("setPlaybackQualityRange", &Array::of2(&q, &q)).is_ok()
    }

    fn is_live(&self) -> bool {
        self.call("getVideoData", &Array::new())
            .ok()
            .and_then(|data| property(&data, &["isLive"]))
            .and_then(|live| live.as_bool())
            .unwrap_or(false)
    }

    fn duration(&self) -> Option<f64> {
        self.call("getDuration", &Array::new())
            .ok()?
            .as_f64()
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    fn supports_playback_rate(&self) -> bool {
        self.method("setPlaybackRate").is_some()
    }

    fn set_playback_rate(&self, rate: f64) -> bool {
        self.call("setPlaybackRate", &Array::of1(&rate.into())).is_ok()
    }

    fn set_element_playback_rate(&self, rate: f64) -> bool {
        match self.video() {
            Some(video) => {
                video.set_playback_rate(rate);
                true
            }
            None => false,
        }
    }

    fn caption_tracks(&self) -> Result<Vec<CaptionTrack>, PlayerError> {
        let response = self.call("getPlayerResponse", &Array::new())?;
        let Some(tracks) = property(&response, &["captions", "playerCaptionsTracklistRenderer", "captionTracks"]) else {
            return Ok(Vec::new());
        };
        let tracks = from_js(&tracks).map_err(|e| PlayerError::Call(describe(&e)))?;
        serde_json::from_value(tracks).map_err(|e| PlayerError::Call(e.to_string()))
    }

    fn set_caption_track(&self, track: Option<&CaptionTrack>) -> Result<(), PlayerError> {
        let option = Object::new();
        if let Some(track) = track {
            let _ = Reflect::set(&option, &"languageCode".into(), &JsValue::from_str(&track.language_code));
            if let Some(kind) = &track.kind {
                let _ = Reflect::set(&option, &"kind".into(), &JsValue::from_str(kind));
            }
        }
        self.call("setOption", &Array::of3(&"captions".into(), &"track".into(), &option))?;
        Ok(())
    }

    fn audio_tracks(&self) -> Result<Vec<String>, PlayerError> {
        Ok(self.audio_track_objects()?.iter().filter_map(|t| Self::track_id(&t)).collect())
    }

    fn current_audio_track(&self) -> Option<String> {
        let track = self.call("getAudioTrack", &Array::new()).ok()?;
        Self::track_id(&track)
    }

    fn set_audio_track(&self, id: &str) -> Result<(), PlayerError> {
        let track = self
            .audio_track_objects()?
            .iter()
            .find(|t| Self::track_id(t).as_deref() == Some(id))
            .ok_or_else(|| PlayerError::Call(format!("audio track {} disappeared", id)))?;
        self.call("setAudioTrack", &Array::of1(&track))?;
        Ok(())
    }

    fn volume(&self) -> Option<f64> {
        self.call("getVolume", &Array::new()).ok()?.as_f64()
    }

    fn set_volume(&self, volume: f64) -> bool {
        self.call("setVolume", &Array::of1(&volume.into())).is_ok()
    }
}

/// Looks the player element up by id in the page document.
pub struct DocumentPlayers {
    document: Document,
}

impl PlayerLocator for DocumentPlayers {
    type Player = JsPlayer;

    fn find(&self, target: PlayerTarget) -> Option<JsPlayer> {
        self.document
            .get_element_by_id(target.element_id())
            .map(|element| JsPlayer { element })
    }
}

// =============================================================================
// Entry points
// =============================================================================

fn page_blob() -> Result<Map<String, Value>, JsValue> {
    let key = StoreConfig::default().page_store_key;
    let raw = window()?.local_storage()?.and_then(|s| s.get_item(&key).ok().flatten());
    Ok(raw
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default())
}

fn read_setting<T: DeserializeOwned>(feature: Feature) -> Result<T, JsValue> {
    let blob = page_blob()?;
    feature_setting(&blob, feature).ok_or_else(|| JsValue::from_str(&format!("No {} record in page store", feature)))
}

async fn player() -> Result<JsPlayer, JsValue> {
    let window = window()?;
    let url = window.location().href()?;
    let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
    let kind = PageKind::classify(&url);
    locate_player(&DocumentPlayers { document }, kind, RetryPolicy::PLAYER_POLL, &TimeoutSleep)
        .await
        .ok_or_else(|| JsValue::from_str("Player not found"))
}

fn outcome(value: impl std::fmt::Debug) -> JsValue {
    JsValue::from_str(&format!("{:?}", value))
}

#[wasm_bindgen(js_name = runQualityScript)]
pub async fn run_quality_script() -> Result<JsValue, JsValue> {
    let setting: VideoQualitySetting = read_setting(Feature::VideoQuality)?;
    let player = player().await?;
    Ok(outcome(apply_quality(&player, &setting)))
}

#[wasm_bindgen(js_name = runSpeedScript)]
pub async fn run_speed_script() -> Result<JsValue, JsValue> {
    let setting: VideoSpeedSetting = read_setting(Feature::VideoSpeed)?;
    let player = player().await?;
    Ok(outcome(apply_speed(&player, &setting)))
}

#[wasm_bindgen(js_name = runSubtitlesScript)]
pub async fn run_subtitles_script() -> Result<JsValue, JsValue> {
    let setting: SubtitlesSetting = read_setting(Feature::Subtitles)?;
    let player = player().await?;
    let track = apply_subtitles(&player, &setting.value, RetryPolicy::PLAYER_CALL, &TimeoutSleep)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&track.map(|t| t.language_code))
}

#[wasm_bindgen(js_name = runAudioTrackScript)]
pub async fn run_audio_track_script() -> Result<JsValue, JsValue> {
    let setting: AudioTrackSetting = read_setting(Feature::AudioTrack)?;
    let player = player().await?;
    let choice = apply_audio_track(&player, &setting.language, RetryPolicy::PLAYER_CALL, &TimeoutSleep)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(outcome(choice))
}

#[wasm_bindgen(js_name = runVolumeScript)]
pub async fn run_volume_script() -> Result<JsValue, JsValue> {
    let setting: VolumeSetting = read_setting(Feature::Volume)?;
    let player = player().await?;
    Ok(outcome(apply_volume(&player, &setting)))
}

/// Gain stage driven by the normaliser script's audio graph.
#[wasm_bindgen]
pub struct Normalizer {
    session: Option<NormalizerSession>,
}

#[wasm_bindgen]
impl Normalizer {
    /// Start from the page-store record; `user_volume` is the element volume (0–1).
    #[wasm_bindgen(constructor)]
    pub fn new(user_volume: f64) -> Result<Normalizer, JsValue> {
        let setting: AudioNormalizerSetting = read_setting(Feature::AudioNormalizer)?;
        Ok(Normalizer {
            session: Some(NormalizerSession::start(&setting, user_volume)),
        })
    }

    /// Element volume for a level measurement in dBFS taken `dt` seconds after the last.
    pub fn process(&mut self, level_db: f64, dt: f64) -> f64 {
        match self.session.as_mut() {
            Some(session) => session.process(level_db, dt),
            None => 0.0,
        }
    }

    #[wasm_bindgen(js_name = setUserVolume)]
    pub fn set_user_volume(&mut self, volume: f64) {
        if let Some(session) = self.session.as_mut() {
            session.set_user_volume(volume);
        }
    }

    /// End processing. Returns the volume to restore.
    pub fn stop(&mut self) -> Option<f64> {
        self.session.take().map(NormalizerSession::stop)
    }
}
