//! Host speech engine boundary
//!
//! The synthesizer core only knows the [`SpeechEngine`] trait. The shipped
//! implementation drives whatever command-line engine the host offers
//! (`say` on macOS, `espeak-ng`/`espeak` elsewhere); rendering happens in a
//! child process that dies with its task, which is what makes
//! cancel-previous cheap and reliable.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;

use crate::{Error, Result};

/// A voice offered by the host engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Engine-specific voice identifier
    pub id: String,
    /// BCP-47-ish locale tag, normalized to lowercase with `-` separators
    pub locale: String,
}

/// One utterance prepared for rendering
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// Selected voice; `None` renders with the engine default
    pub voice: Option<Voice>,
    /// Speaking rate multiplier (1.0 = engine default)
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default)
    pub pitch: f32,
}

/// A host text-to-speech engine
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Voices the engine offers
    fn voices(&self) -> Vec<Voice>;

    /// Render one utterance to audible speech, returning when playback
    /// finishes. Dropping the future must stop audible output.
    async fn speak(&self, utterance: &Utterance) -> Result<()>;
}

/// Which command-line engine was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineKind {
    Say,
    Espeak,
}

/// Baseline words-per-minute used to scale the rate multiplier
const BASE_RATE_WPM: f32 = 175.0;

/// Baseline espeak pitch (0-99 scale) used to scale the pitch multiplier
const BASE_PITCH: f32 = 50.0;

/// Command-line host engine located on `PATH`
pub struct HostCommandEngine {
    program: PathBuf,
    kind: EngineKind,
    voices: Vec<Voice>,
}

impl HostCommandEngine {
    /// Locate a host engine, probing its voice list once.
    ///
    /// Returns `None` when the host has no speech engine; the caller
    /// reports the capability gap and degrades to a no-op.
    #[must_use]
    pub fn discover() -> Option<Self> {
        let (program, kind) = which::which("say")
            .map(|p| (p, EngineKind::Say))
            .or_else(|_| which::which("espeak-ng").map(|p| (p, EngineKind::Espeak)))
            .or_else(|_| which::which("espeak").map(|p| (p, EngineKind::Espeak)))
            .ok()?;

        let voices = probe_voices(&program, kind);
        tracing::debug!(
            program = %program.display(),
            voices = voices.len(),
            "speech engine discovered"
        );

        Some(Self {
            program,
            kind,
            voices,
        })
    }

    fn render_args(&self, utterance: &Utterance) -> Vec<String> {
        let mut args = Vec::new();
        match self.kind {
            EngineKind::Say => {
                if let Some(voice) = &utterance.voice {
                    args.push("-v".to_string());
                    args.push(voice.id.clone());
                }
                args.push("-r".to_string());
                args.push(format!("{:.0}", BASE_RATE_WPM * utterance.rate));
            }
            EngineKind::Espeak => {
                if let Some(voice) = &utterance.voice {
                    args.push("-v".to_string());
                    args.push(voice.id.clone());
                }
                args.push("-s".to_string());
                args.push(format!("{:.0}", BASE_RATE_WPM * utterance.rate));
                args.push("-p".to_string());
                args.push(format!(
                    "{:.0}",
                    (BASE_PITCH * utterance.pitch).clamp(0.0, 99.0)
                ));
            }
        }
        args.push(utterance.text.clone());
        args
    }
}

#[async_trait]
impl SpeechEngine for HostCommandEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(self.render_args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Aborting the speaking task drops the child and silences it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::CapabilityMissing(e.to_string()))?;

        let status = child.wait().await?;
        if !status.success() {
            tracing::warn!(status = %status, "speech engine exited abnormally");
        }
        Ok(())
    }
}

/// Run the engine's voice listing and parse it. An unparseable or failing
/// listing yields no voices; the engine default is used instead.
fn probe_voices(program: &std::path::Path, kind: EngineKind) -> Vec<Voice> {
    let output = match kind {
        EngineKind::Say => std::process::Command::new(program)
            .args(["-v", "?"])
            .output(),
        EngineKind::Espeak => std::process::Command::new(program)
            .arg("--voices")
            .output(),
    };

    let Ok(output) = output else {
        return Vec::new();
    };
    let listing = String::from_utf8_lossy(&output.stdout);

    match kind {
        EngineKind::Say => parse_say_voices(&listing),
        EngineKind::Espeak => parse_espeak_voices(&listing),
    }
}

/// Parse `say -v ?` output: `Name            locale    # sample text`
fn parse_say_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter_map(|line| {
            let before_comment = line.split('#').next()?.trim_end();
            let locale = before_comment.split_whitespace().last()?;
            if !locale.contains('_') && !locale.contains('-') {
                return None;
            }
            let name = before_comment[..before_comment.rfind(locale)?].trim();
            if name.is_empty() {
                return None;
            }
            Some(Voice {
                id: name.to_string(),
                locale: normalize_locale(locale),
            })
        })
        .collect()
}

/// Parse `espeak --voices` output: `Pty Language Age/Gender VoiceName File ...`
fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _pty = fields.next()?;
            let language = fields.next()?;
            let _age_gender = fields.next()?;
            let _name = fields.next()?;
            // espeak selects by language code, not display name.
            Some(Voice {
                id: language.to_string(),
                locale: normalize_locale(language),
            })
        })
        .collect()
}

/// Lowercase a locale tag and unify `_` to `-`
#[must_use]
pub fn normalize_locale(tag: &str) -> String {
    tag.trim().to_lowercase().replace('_', "-")
}
