//! Speech/silence state machine
//!
//! Consumes one volume sample per analysis frame and decides when an
//! utterance starts and ends. Debounce is a trailing-silence window: the
//! timer marks when continuous silence began, and any voiced frame re-arms
//! the full window, so brief pauses inside a sentence do not cut it off.

use std::time::{Duration, Instant};

/// Default RMS level above which a frame counts as speech
pub const DEFAULT_THRESHOLD: f32 = 0.02;

/// Default trailing-silence window before an utterance is considered finished
pub const DEFAULT_SILENCE_DELAY: Duration = Duration::from_millis(1500);

/// State of one monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Not monitoring
    Idle,
    /// Monitoring; no speech in progress
    ListeningSilent,
    /// Speech in progress; `silence_since` marks when trailing silence began,
    /// if any
    ListeningSpeaking { silence_since: Option<Instant> },
}

/// Outcome of observing one volume sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No boundary crossed
    None,
    /// First voiced frame of a new utterance
    SpeechStart,
    /// Trailing silence outlasted the delay; the utterance is finished
    SpeechEnd,
}

/// Threshold-and-debounce speech detector.
///
/// Transitions occur only on volume-threshold crossings or silence-timeout
/// expiry, never directly. The detector performs no I/O; the caller reads
/// the wall clock once per frame and passes it in, so there is no timer
/// thread and no finalize without an incoming frame.
#[derive(Debug)]
pub struct SpeechDetector {
    threshold: f32,
    silence_delay: Duration,
    state: MonitorState,
}

impl SpeechDetector {
    #[must_use]
    pub const fn new(threshold: f32, silence_delay: Duration) -> Self {
        Self {
            threshold,
            silence_delay,
            state: MonitorState::Idle,
        }
    }

    /// Enter `ListeningSilent`. Called when monitoring starts.
    pub const fn begin(&mut self) {
        self.state = MonitorState::ListeningSilent;
    }

    /// Return to `Idle`, dropping any pending silence timer. Called on stop.
    pub const fn reset(&mut self) {
        self.state = MonitorState::Idle;
    }

    #[must_use]
    pub const fn state(&self) -> MonitorState {
        self.state
    }

    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        matches!(self.state, MonitorState::ListeningSpeaking { .. })
    }

    /// Feed one volume sample observed at `now`.
    ///
    /// A sample exactly at the threshold counts as silence; speech requires
    /// strictly greater volume.
    pub fn observe(&mut self, volume: f32, now: Instant) -> Transition {
        let voiced = volume > self.threshold;

        match self.state {
            MonitorState::Idle => Transition::None,
            MonitorState::ListeningSilent => {
                if voiced {
                    self.state = MonitorState::ListeningSpeaking {
                        silence_since: None,
                    };
                    Transition::SpeechStart
                } else {
                    Transition::None
                }
            }
            MonitorState::ListeningSpeaking { silence_since } => {
                if voiced {
                    // Each voiced frame resets the countdown to end-of-utterance.
                    self.state = MonitorState::ListeningSpeaking {
                        silence_since: None,
                    };
                    return Transition::None;
                }

                match silence_since {
                    None => {
                        self.state = MonitorState::ListeningSpeaking {
                            silence_since: Some(now),
                        };
                        Transition::None
                    }
                    Some(since) if now.duration_since(since) > self.silence_delay => {
                        self.state = MonitorState::ListeningSilent;
                        Transition::SpeechEnd
                    }
                    Some(_) => Transition::None,
                }
            }
        }
    }
}

impl Default for SpeechDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_SILENCE_DELAY)
    }
}
