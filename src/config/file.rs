//! TOML configuration file loading
//!
//! Reads `~/.config/murmur/config.toml` when present. Every field is
//! optional; the file is a partial overlay on top of built-in defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MurmurConfigFile {
    /// Capture and detection settings
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Transcription service settings
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Speech synthesis settings
    #[serde(default)]
    pub tts: TtsFileConfig,
}

/// Capture and detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// RMS level above which a frame counts as speech
    pub threshold: Option<f32>,

    /// Trailing-silence window in milliseconds before an utterance ends
    pub silence_delay_ms: Option<u64>,

    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Analysis frame size in samples
    pub frame_size: Option<usize>,

    /// Preferred input device name; omit for the system default
    pub input_device: Option<String>,
}

/// Transcription service configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Transcription endpoint URL
    pub endpoint: Option<String>,

    /// Bearer credential (the persisted tier of the resolution chain)
    pub credential: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Voice locale (e.g. "tr-TR")
    pub locale: Option<String>,

    /// Speaking rate multiplier
    pub rate: Option<f32>,

    /// Voice pitch multiplier
    pub pitch: Option<f32>,
}

/// Path of the config file under the platform config directory
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "murmur")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the config file if present. A missing file is not an error.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load() -> crate::Result<MurmurConfigFile> {
    let Some(path) = config_file_path() else {
        return Ok(MurmurConfigFile::default());
    };

    if !path.exists() {
        return Ok(MurmurConfigFile::default());
    }

    let raw = std::fs::read_to_string(&path)?;
    let parsed = toml::from_str(&raw)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(parsed)
}
