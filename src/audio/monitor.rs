//! Audio monitor orchestration
//!
//! Owns the live input session: drives analysis frames through the volume
//! estimator and speech detector, routes raw chunks to the segment recorder,
//! and emits ordered [`MonitorEvent`]s to the host application.
//!
//! One dedicated processing thread drains the input channel, so exactly one
//! frame is processed at a time, in arrival order, and a transition fully
//! completes (recorder instruction included) before the next frame.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use super::detector::{SpeechDetector, Transition, DEFAULT_SILENCE_DELAY, DEFAULT_THRESHOLD};
use super::input::{InputEvent, InputSink, InputSource, DEFAULT_SAMPLE_RATE};
use super::level;
use super::segment::{EncodedSegment, SegmentRecorder};
use crate::Result;

/// How long the processing thread waits for input before rechecking stop
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Observable side effects of a monitoring session, in sample-arrival order
#[derive(Debug)]
pub enum MonitorEvent {
    /// The first voiced frame of an utterance was observed
    SpeechStart,
    /// An utterance finished; carries the encoded segment
    SpeechEnd(EncodedSegment),
    /// RMS level of the latest analysis frame, for UI metering.
    /// Emitted for every frame regardless of state.
    VolumeChange(f32),
}

/// Tuning for a monitoring session
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// RMS level above which a frame counts as speech
    pub threshold: f32,
    /// Trailing-silence window ending an utterance
    pub silence_delay: Duration,
    /// Capture sample rate
    pub sample_rate: u32,
    /// Input channel capacity between the device callback and processing
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            silence_delay: DEFAULT_SILENCE_DELAY,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_capacity: 64,
        }
    }
}

/// Live resources of one started session
struct Session {
    stop: Arc<AtomicBool>,
    worker: JoinHandle<()>,
    dropped: Arc<AtomicUsize>,
}

/// Orchestrates the capture pipeline over an abstract input source
pub struct AudioMonitor {
    source: Box<dyn InputSource>,
    config: MonitorConfig,
    events_tx: Sender<MonitorEvent>,
    events_rx: Receiver<MonitorEvent>,
    session: Option<Session>,
}

impl AudioMonitor {
    #[must_use]
    pub fn new(source: Box<dyn InputSource>, config: MonitorConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            source,
            config,
            events_tx,
            events_rx,
            session: None,
        }
    }

    /// Receiver for session events. Single consumer; events arrive strictly
    /// in the order samples were received.
    #[must_use]
    pub fn events(&self) -> Receiver<MonitorEvent> {
        self.events_rx.clone()
    }

    /// Acquire the input device and begin monitoring.
    ///
    /// A no-op returning `Ok` when already started; the device is never
    /// acquired twice by one monitor.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::DeviceUnavailable`] if the device cannot
    /// be acquired; no partial session state is left behind.
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let (input_tx, input_rx) = bounded(self.config.channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let sink = InputSink::new(input_tx, Arc::clone(&dropped));

        self.source.acquire(sink)?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = Arc::clone(&stop);
            let events = self.events_tx.clone();
            let detector = SpeechDetector::new(self.config.threshold, self.config.silence_delay);
            let recorder = SegmentRecorder::new(self.config.sample_rate);
            std::thread::spawn(move || session_loop(&input_rx, &stop, &events, detector, recorder))
        };

        self.session = Some(Session {
            stop,
            worker,
            dropped,
        });

        tracing::info!(source = %self.source.describe(), "monitoring started");
        Ok(())
    }

    /// Stop monitoring, release the device, and drop any open recording.
    ///
    /// Synchronously halts frame delivery; no event is emitted after this
    /// returns, even if a finalize was logically pending. Safe to call
    /// repeatedly.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.stop.store(true, Ordering::SeqCst);
        self.source.release();

        if session.worker.join().is_err() {
            tracing::error!("session worker panicked");
        }

        let dropped = session.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(dropped, "input events dropped during session");
        }
        tracing::info!("monitoring stopped");
    }

    /// Whether a session is currently active
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for AudioMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Emit one event unless the session was stopped. Returns false once the
/// stop flag is set so the caller can bail out.
fn emit(stop: &AtomicBool, events: &Sender<MonitorEvent>, event: MonitorEvent) -> bool {
    if stop.load(Ordering::SeqCst) {
        return false;
    }
    events.send(event).is_ok()
}

fn session_loop(
    input: &Receiver<InputEvent>,
    stop: &AtomicBool,
    events: &Sender<MonitorEvent>,
    mut detector: SpeechDetector,
    mut recorder: SegmentRecorder,
) {
    detector.begin();

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match input.recv_timeout(IDLE_POLL) {
            Ok(InputEvent::Frame(frame)) => {
                let volume = level::rms(&frame);
                if !emit(stop, events, MonitorEvent::VolumeChange(volume)) {
                    break;
                }

                match detector.observe(volume, Instant::now()) {
                    Transition::SpeechStart => {
                        recorder.begin();
                        tracing::debug!(volume, "speech started");
                        if !emit(stop, events, MonitorEvent::SpeechStart) {
                            break;
                        }
                    }
                    Transition::SpeechEnd => match recorder.finalize() {
                        Ok(segment) => {
                            tracing::debug!(
                                samples = segment.samples,
                                duration_ms = segment.duration.as_millis(),
                                "speech ended"
                            );
                            if !emit(stop, events, MonitorEvent::SpeechEnd(segment)) {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "segment encoding failed");
                        }
                    },
                    Transition::None => {}
                }
            }
            Ok(InputEvent::Chunk(chunk)) => {
                recorder.append(&chunk);
            }
            Err(RecvTimeoutError::Timeout) => {
                // No frames, no silence to detect; the clock only advances
                // with incoming frames.
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("input stream closed");
                break;
            }
        }
    }

    // Leave nothing dangling: open recordings and timers die with the session.
    recorder.abort();
    detector.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Input source that hands its sink to the test for scripted delivery
    struct ScriptedInput {
        sink_slot: Arc<Mutex<Option<InputSink>>>,
        acquisitions: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ScriptedInput {
        fn new() -> (Self, Arc<Mutex<Option<InputSink>>>, Arc<AtomicUsize>) {
            let slot = Arc::new(Mutex::new(None));
            let count = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    sink_slot: Arc::clone(&slot),
                    acquisitions: Arc::clone(&count),
                    fail: false,
                },
                slot,
                count,
            )
        }

        fn failing() -> Self {
            Self {
                sink_slot: Arc::new(Mutex::new(None)),
                acquisitions: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }
        }
    }

    impl InputSource for ScriptedInput {
        fn acquire(&mut self, sink: InputSink) -> Result<()> {
            if self.fail {
                return Err(crate::Error::DeviceUnavailable("denied".to_string()));
            }
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            *self.sink_slot.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn release(&mut self) {
            *self.sink_slot.lock().unwrap() = None;
        }
    }

    fn config() -> MonitorConfig {
        MonitorConfig {
            threshold: 0.02,
            silence_delay: Duration::from_millis(40),
            sample_rate: 16_000,
            channel_capacity: 64,
        }
    }

    fn deliver(slot: &Arc<Mutex<Option<InputSink>>>, level: f32, samples: usize) {
        let guard = slot.lock().unwrap();
        let sink = guard.as_ref().expect("sink not acquired");
        sink.deliver(InputEvent::Frame(vec![level; samples]));
        sink.deliver(InputEvent::Chunk(vec![level; samples]));
    }

    fn drain_for(rx: &Receiver<MonitorEvent>, ms: u64) -> Vec<MonitorEvent> {
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut out = Vec::new();
        while Instant::now() < deadline {
            if let Ok(ev) = rx.recv_timeout(Duration::from_millis(10)) {
                out.push(ev);
            }
        }
        out
    }

    #[test]
    fn double_start_acquires_once() {
        let (source, _slot, acquisitions) = ScriptedInput::new();
        let mut monitor = AudioMonitor::new(Box::new(source), config());

        monitor.start().unwrap();
        monitor.start().unwrap();

        assert_eq!(acquisitions.load(Ordering::SeqCst), 1);
        monitor.stop();
    }

    #[test]
    fn failed_start_leaves_no_session() {
        let mut monitor = AudioMonitor::new(Box::new(ScriptedInput::failing()), config());

        assert!(matches!(
            monitor.start(),
            Err(crate::Error::DeviceUnavailable(_))
        ));
        assert!(!monitor.is_active());
    }

    #[test]
    fn stop_is_idempotent_and_silences_events() {
        let (source, slot, _) = ScriptedInput::new();
        let mut monitor = AudioMonitor::new(Box::new(source), config());
        let events = monitor.events();

        monitor.start().unwrap();
        deliver(&slot, 0.5, 256);
        std::thread::sleep(Duration::from_millis(30));

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_active());

        // Whatever was emitted happened before stop; nothing arrives after.
        let _ = drain_for(&events, 20);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn utterance_produces_ordered_events() {
        let (source, slot, _) = ScriptedInput::new();
        let mut monitor = AudioMonitor::new(Box::new(source), config());
        let events = monitor.events();

        monitor.start().unwrap();

        // Silence, speech, then silence long enough to finalize.
        deliver(&slot, 0.0, 256);
        deliver(&slot, 0.5, 256);
        std::thread::sleep(Duration::from_millis(10));
        deliver(&slot, 0.5, 256);
        std::thread::sleep(Duration::from_millis(10));
        deliver(&slot, 0.0, 256);
        std::thread::sleep(Duration::from_millis(60));
        deliver(&slot, 0.0, 256);

        let collected = drain_for(&events, 120);
        monitor.stop();

        let mut saw_start = false;
        let mut segment = None;
        let mut volume_changes = 0;
        for event in collected {
            match event {
                MonitorEvent::SpeechStart => {
                    assert!(segment.is_none(), "start must precede end");
                    saw_start = true;
                }
                MonitorEvent::SpeechEnd(s) => {
                    assert!(saw_start, "end without start");
                    segment = Some(s);
                }
                MonitorEvent::VolumeChange(_) => volume_changes += 1,
            }
        }

        assert!(saw_start);
        let segment = segment.expect("no segment finalized");
        // Chunks from speech start through the silence tail, nothing lost:
        // the voiced chunks (2 x 256) plus the silence chunk observed before
        // the finalize frame (256).
        assert_eq!(segment.samples, 768);
        assert_eq!(volume_changes, 5);
    }

    #[test]
    fn segment_excludes_audio_before_speech() {
        let (source, slot, _) = ScriptedInput::new();
        let mut monitor = AudioMonitor::new(Box::new(source), config());
        let events = monitor.events();

        monitor.start().unwrap();

        deliver(&slot, 0.0, 256);
        deliver(&slot, 0.0, 256);
        std::thread::sleep(Duration::from_millis(10));
        deliver(&slot, 0.5, 256);
        std::thread::sleep(Duration::from_millis(10));
        deliver(&slot, 0.0, 256);
        std::thread::sleep(Duration::from_millis(60));
        deliver(&slot, 0.0, 256);

        let collected = drain_for(&events, 120);
        monitor.stop();

        let segment = collected
            .into_iter()
            .find_map(|e| match e {
                MonitorEvent::SpeechEnd(s) => Some(s),
                _ => None,
            })
            .expect("no segment");

        // Leading silence chunks are not part of the utterance.
        assert_eq!(segment.samples, 512);
    }
}
