//! Speech synthesis boundary
//!
//! Best-effort by contract: a host without a speech engine degrades to a
//! reported no-op, and a failed utterance never affects the capture
//! pipeline. At most one utterance renders at a time; a new `speak` cancels
//! whatever is still in flight.

mod engine;

pub use engine::{normalize_locale, HostCommandEngine, SpeechEngine, Utterance, Voice};

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::TtsConfig;

/// Handle to one requested utterance
pub struct UtteranceHandle {
    done: oneshot::Receiver<bool>,
}

impl UtteranceHandle {
    /// Wait for the utterance. `true` means it rendered to completion;
    /// `false` means it was cancelled by a later call, stopped, or the
    /// capability is missing.
    pub async fn finished(self) -> bool {
        self.done.await.unwrap_or(false)
    }

    fn resolved(value: bool) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(value);
        Self { done: rx }
    }
}

/// In-flight utterance state
struct Active {
    task: JoinHandle<()>,
}

/// Renders text responses as audible speech
pub struct Synthesizer {
    engine: Option<Arc<dyn SpeechEngine>>,
    locale: String,
    rate: f32,
    pitch: f32,
    active: Mutex<Option<Active>>,
}

impl Synthesizer {
    /// Build a synthesizer over an explicit engine (or none)
    #[must_use]
    pub fn new(engine: Option<Arc<dyn SpeechEngine>>, config: &TtsConfig) -> Self {
        if engine.is_none() {
            // Reported once here; every speak call then degrades silently.
            tracing::warn!("no speech engine on this host; synthesis is a no-op");
        }

        Self {
            engine,
            locale: normalize_locale(&config.locale),
            rate: config.rate,
            pitch: config.pitch,
            active: Mutex::new(None),
        }
    }

    /// Build a synthesizer with whatever host engine can be discovered
    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        let engine = HostCommandEngine::discover()
            .map(|e| Arc::new(e) as Arc<dyn SpeechEngine>);
        Self::new(engine, config)
    }

    /// Whether a speech engine is present
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Speak `text`, cancelling any in-flight utterance first: last call
    /// wins, nothing is queued. Markup characters are stripped before
    /// synthesis. Must be called within a tokio runtime.
    pub fn speak(&self, text: &str) -> UtteranceHandle {
        let Some(engine) = &self.engine else {
            return UtteranceHandle::resolved(false);
        };

        let cleaned = strip_markup(text);
        if cleaned.is_empty() {
            return UtteranceHandle::resolved(false);
        }

        let utterance = Utterance {
            text: cleaned,
            voice: select_voice(&engine.voices(), &self.locale),
            rate: self.rate,
            pitch: self.pitch,
        };

        let mut active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.task.abort();
        }

        let engine = Arc::clone(engine);
        let (done_tx, done_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            match engine.speak(&utterance).await {
                Ok(()) => {
                    let _ = done_tx.send(true);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "synthesis failed");
                    let _ = done_tx.send(false);
                }
            }
        });
        *active = Some(Active { task });

        UtteranceHandle { done: done_rx }
    }

    /// Cancel the in-flight utterance, if any, without starting a new one
    pub fn stop(&self) {
        let mut active = self.active.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.task.abort();
        }
    }
}

impl Drop for Synthesizer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pick the first voice matching the locale exactly, else any voice sharing
/// its language, else none (engine default).
fn select_voice(voices: &[Voice], locale: &str) -> Option<Voice> {
    if let Some(exact) = voices.iter().find(|v| v.locale == locale) {
        return Some(exact.clone());
    }

    let language = locale.split('-').next().unwrap_or(locale);
    voices
        .iter()
        .find(|v| v.locale.split('-').next().unwrap_or(&v.locale) == language)
        .cloned()
}

/// Strip basic markup so the engine reads prose, not formatting: markdown
/// emphasis and heading characters, backticks, and HTML tags.
fn strip_markup(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            '*' | '_' | '#' | '`' | '~' => {}
            _ if !in_tag => cleaned.push(c),
            _ => {}
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
