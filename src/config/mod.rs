//! Configuration management for the murmur pipeline

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::audio::{MonitorConfig, DEFAULT_FRAME_SIZE, DEFAULT_SAMPLE_RATE};
use crate::Result;

/// Default transcription endpoint (whisper-style, POST WAV + bearer)
pub const DEFAULT_STT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default synthesis locale
pub const DEFAULT_LOCALE: &str = "tr-TR";

/// Runtime configuration, assembled from defaults, the TOML config file,
/// and `MURMUR_*` environment variables (in increasing precedence)
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture and detection settings
    pub voice: VoiceConfig,

    /// Transcription service settings
    pub stt: SttConfig,

    /// Speech synthesis settings
    pub tts: TtsConfig,
}

/// Capture and detection configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// RMS level above which a frame counts as speech
    pub threshold: f32,

    /// Trailing-silence window before an utterance ends
    pub silence_delay: Duration,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Analysis frame size in samples
    pub frame_size: usize,

    /// Preferred input device name; `None` for the system default
    pub input_device: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            threshold: crate::audio::DEFAULT_THRESHOLD,
            silence_delay: crate::audio::DEFAULT_SILENCE_DELAY,
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            input_device: None,
        }
    }
}

/// Transcription service configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Transcription endpoint URL
    pub endpoint: String,

    /// Persisted bearer credential, if configured
    pub credential: Option<SecretString>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STT_ENDPOINT.to_string(),
            credential: None,
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Voice locale for synthesis
    pub locale: String,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Voice pitch multiplier
    pub pitch: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

impl Config {
    /// Load configuration: defaults, overlaid by the config file, overlaid
    /// by environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting values are out of range.
    pub fn load() -> Result<Self> {
        let overlay = file::load()?;
        let config = Self::from_overlay(overlay);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.voice.threshold) {
            return Err(crate::Error::Config(format!(
                "threshold {} outside [0.0, 1.0]",
                self.voice.threshold
            )));
        }
        if self.voice.frame_size == 0 {
            return Err(crate::Error::Config("frame_size must be nonzero".to_string()));
        }
        if self.voice.sample_rate == 0 {
            return Err(crate::Error::Config("sample_rate must be nonzero".to_string()));
        }
        Ok(())
    }

    fn from_overlay(overlay: file::MurmurConfigFile) -> Self {
        let mut config = Self {
            voice: VoiceConfig::default(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
        };

        if let Some(threshold) = overlay.voice.threshold {
            config.voice.threshold = threshold;
        }
        if let Some(ms) = overlay.voice.silence_delay_ms {
            config.voice.silence_delay = Duration::from_millis(ms);
        }
        if let Some(rate) = overlay.voice.sample_rate {
            config.voice.sample_rate = rate;
        }
        if let Some(size) = overlay.voice.frame_size {
            config.voice.frame_size = size;
        }
        if let Some(device) = overlay.voice.input_device {
            config.voice.input_device = Some(device);
        }

        if let Some(endpoint) = overlay.stt.endpoint {
            config.stt.endpoint = endpoint;
        }
        if let Some(credential) = overlay.stt.credential {
            config.stt.credential = Some(SecretString::from(credential));
        }

        if let Some(locale) = overlay.tts.locale {
            config.tts.locale = locale;
        }
        if let Some(rate) = overlay.tts.rate {
            config.tts.rate = rate;
        }
        if let Some(pitch) = overlay.tts.pitch {
            config.tts.pitch = pitch;
        }

        // Environment wins over the file.
        if let Ok(endpoint) = std::env::var("MURMUR_STT_URL") {
            config.stt.endpoint = endpoint;
        }
        if let Ok(locale) = std::env::var("MURMUR_LOCALE") {
            config.tts.locale = locale;
        }

        config
    }

    /// Monitor tuning derived from this configuration
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            threshold: self.voice.threshold,
            silence_delay: self.voice.silence_delay,
            sample_rate: self.voice.sample_rate,
            ..MonitorConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voice: VoiceConfig::default(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}
