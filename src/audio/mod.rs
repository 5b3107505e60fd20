//! Audio capture and voice activity detection pipeline
//!
//! Frames from the input device are measured by the volume estimator, fed
//! through the speech/silence state machine, and buffered by the segment
//! recorder while speech is in progress. The monitor owns the wiring and
//! emits events to the host application.

mod detector;
mod input;
mod level;
mod monitor;
mod segment;

pub use detector::{
    MonitorState, SpeechDetector, Transition, DEFAULT_SILENCE_DELAY, DEFAULT_THRESHOLD,
};
pub use input::{
    list_input_devices, CpalInput, InputEvent, InputSink, InputSource, DEFAULT_FRAME_SIZE,
    DEFAULT_SAMPLE_RATE,
};
pub use level::rms;
pub use monitor::{AudioMonitor, MonitorConfig, MonitorEvent};
pub use segment::{samples_to_wav, EncodedSegment, SegmentRecorder};
