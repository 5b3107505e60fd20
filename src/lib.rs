//! Murmur: voice activity detection and speech capture pipeline
//!
//! Continuously samples a live audio stream, decides in real time when the
//! user starts and stops speaking, buffers only the speech segment, and
//! hands it off for transcription. A separate synthesis path renders text
//! responses back to audible speech.
//!
//! # Architecture
//!
//! ```text
//! input device ──► AudioMonitor ──► volume estimator ──► speech detector
//!                       │                                      │
//!                       │ raw chunks                speech start/end
//!                       ▼                                      ▼
//!                 SegmentRecorder ───────────────► encoded WAV segment
//!                                                        │
//!                                                        ▼
//!                                               TranscriptionClient ──► text
//!
//! text ──► Synthesizer ──► host speech engine
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod stt;
pub mod tts;

pub use audio::{
    AudioMonitor, CpalInput, EncodedSegment, MonitorConfig, MonitorEvent, MonitorState,
    SegmentRecorder, SpeechDetector,
};
pub use config::Config;
pub use error::{Error, Result};
pub use stt::TranscriptionClient;
pub use tts::Synthesizer;
