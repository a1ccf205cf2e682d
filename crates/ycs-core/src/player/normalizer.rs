//! Audio normaliser
//!
//! A heuristic loudness leveller: an envelope follower tracks the measured
//! level, levels above the threshold are compressed by `ratio`, and the result
//! is scaled by `boost`. The output is a gain applied on top of the volume the
//! user had chosen before processing started.

use crate::settings::{AudioNormalizerSetting, CompressorSettings, NormalizerPreset};

impl NormalizerPreset {
    /// Compressor parameters of a preset. `Custom` falls back to `Medium`
    /// when the record carries no custom parameters.
    pub fn compressor(self, custom: Option<CompressorSettings>) -> CompressorSettings {
        match self {
            Self::Light => CompressorSettings {
                threshold: -24.0,
                boost: 1.1,
                ratio: 2.0,
                attack: 0.02,
                release: 0.3,
            },
            Self::Medium => CompressorSettings {
                threshold: -30.0,
                boost: 1.5,
                ratio: 4.0,
                attack: 0.01,
                release: 0.25,
            },
            Self::Strong => CompressorSettings {
                threshold: -40.0,
                boost: 2.0,
                ratio: 8.0,
                attack: 0.002,
                release: 0.2,
            },
            Self::Custom => custom.unwrap_or_else(|| Self::Medium.compressor(None)),
        }
    }
}

/// Smoothing factor for a one-pole follower with time constant `time`.
fn smoothing(dt: f64, time: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if time <= 0.0 {
        1.0
    } else {
        1.0 - (-dt / time).exp()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compressor {
    settings: CompressorSettings,
    envelope: Option<f64>,
}

impl Compressor {
    pub fn new(settings: CompressorSettings) -> Self {
        Self {
            settings,
            envelope: None,
        }
    }

    pub fn for_setting(setting: &AudioNormalizerSetting) -> Self {
        Self::new(setting.value.compressor(setting.custom_settings))
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Feed a level measurement in dBFS taken `dt` seconds after the previous
    /// one. Returns the linear gain to apply.
    pub fn process(&mut self, level_db: f64, dt: f64) -> f64 {
        let envelope = match self.envelope {
            None => level_db,
            Some(env) => {
                let time = if level_db > env {
                    self.settings.attack
                } else {
                    self.settings.release
                };
                env + (level_db - env) * smoothing(dt, time)
            }
        };
        self.envelope = Some(envelope);
        self.gain()
    }

    /// Gain reduction in dB for the current envelope (zero or negative).
    pub fn reduction_db(&self) -> f64 {
        let Some(env) = self.envelope else {
            return 0.0;
        };
        let threshold = self.settings.threshold;
        if env <= threshold {
            return 0.0;
        }
        let ratio = self.settings.ratio.max(1.0);
        threshold + (env - threshold) / ratio - env
    }

    pub fn gain(&self) -> f64 {
        self.settings.boost * 10f64.powf(self.reduction_db() / 20.0)
    }
}

/// One activation of the normaliser on a video element.
///
/// Holds the user's own volume so it can be restored exactly on stop.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerSession {
    compressor: Compressor,
    user_volume: f64,
}

impl NormalizerSession {
    /// `user_volume` is the element volume (0.0–1.0) before processing.
    pub fn start(setting: &AudioNormalizerSetting, user_volume: f64) -> Self {
        let compressor = Compressor::for_setting(setting);
        log::info!(
            target: "ycs::normalizer",
            "Setting up audio normalizer ({:?}, threshold {} dB)",
            setting.value,
            compressor.settings().threshold
        );
        Self {
            compressor,
            user_volume: user_volume.clamp(0.0, 1.0),
        }
    }

    pub fn user_volume(&self) -> f64 {
        self.user_volume
    }

    /// The user moved the volume slider while processing.
    pub fn set_user_volume(&mut self, volume: f64) {
        self.user_volume = volume.clamp(0.0, 1.0);
    }

    /// Element volume to set for the latest level measurement.
    pub fn process(&mut self, level_db: f64, dt: f64) -> f64 {
        let gain = self.compressor.process(level_db, dt);
        (self.user_volume * gain).clamp(0.0, 1.0)
    }

    /// End processing. Returns the volume to restore.
    pub fn stop(self) -> f64 {
        log::info!(target: "ycs::normalizer", "Audio processing cleaned up");
        self.user_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ExtensionSettings;

    fn flat(boost: f64) -> CompressorSettings {
        CompressorSettings {
            threshold: -30.0,
            boost,
            ratio: 4.0,
            attack: 0.01,
            release: 0.25,
        }
    }

    #[test]
    fn test_quiet_signal_only_boosted() {
        let mut c = Compressor::new(flat(1.2));
        let gain = c.process(-50.0, 0.0);
        assert!((gain - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_loud_signal_compressed() {
        let mut c = Compressor::new(flat(1.0));
        c.process(-10.0, 0.0);
        // 20 dB over threshold at 4:1 leaves 5 dB, so 15 dB of reduction
        assert!((c.reduction_db() + 15.0).abs() < 1e-9);
        assert!(c.gain() < 0.2);
    }

    #[test]
    fn test_envelope_smooths() {
        let mut c = Compressor::new(flat(1.0));
        c.process(-60.0, 0.0);
        c.process(0.0, 0.001);
        // One millisecond into a 10 ms attack the envelope has not reached the peak
        let partial = c.reduction_db();
        c.process(0.0, 1.0);
        assert!(c.reduction_db() < partial);
    }

    #[test]
    fn test_presets() {
        let defaults = ExtensionSettings::default().audio_normalizer;
        let c = Compressor::for_setting(&defaults);
        assert_eq!(c.settings().threshold, -30.0);
        assert_eq!(c.settings().boost, 1.2);
        assert_eq!(NormalizerPreset::Custom.compressor(None), NormalizerPreset::Medium.compressor(None));
        assert!(NormalizerPreset::Strong.compressor(None).ratio > NormalizerPreset::Light.compressor(None).ratio);
    }

    #[test]
    fn test_session_restores_user_volume() {
        let setting = ExtensionSettings::default().audio_normalizer;
        let mut session = NormalizerSession::start(&setting, 0.5);
        let v = session.process(-50.0, 0.016);
        assert!((v - 0.6).abs() < 1e-9);
        assert!(session.process(-5.0, 1.0) < 0.5);
        session.set_user_volume(0.8);
        assert_eq!(session.stop(), 0.8);
    }
}
