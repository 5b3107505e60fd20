//! Capture pipeline integration tests
//!
//! Exercises the detector, recorder, and monitor without audio hardware.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use murmur::audio::{
    rms, samples_to_wav, InputEvent, InputSink, InputSource, MonitorConfig, MonitorEvent,
    SpeechDetector, Transition, DEFAULT_SAMPLE_RATE,
};
use murmur::{AudioMonitor, Error, SegmentRecorder};

mod common;

/// Drive a detector and recorder the way the monitor does: each tick
/// observes the volume first, then delivers that tick's chunk.
fn run_script(
    samples: &[f32],
    tick: Duration,
    threshold: f32,
    silence_delay: Duration,
    chunk_len: usize,
) -> (Option<usize>, Option<usize>, usize) {
    let mut detector = SpeechDetector::new(threshold, silence_delay);
    detector.begin();
    let mut recorder = SegmentRecorder::new(DEFAULT_SAMPLE_RATE);

    let base = Instant::now();
    let mut started_at = None;
    let mut ended_at = None;
    let mut segment_samples = 0;

    for (index, &volume) in samples.iter().enumerate() {
        let now = base + tick * index as u32;
        match detector.observe(volume, now) {
            Transition::SpeechStart => {
                started_at = Some(index);
                recorder.begin();
            }
            Transition::SpeechEnd => {
                ended_at = Some(index);
                segment_samples = recorder.finalize().unwrap().samples;
            }
            Transition::None => {}
        }
        recorder.append(&vec![volume; chunk_len]);
    }

    (started_at, ended_at, segment_samples)
}

#[test]
fn threshold_crossing_and_silence_window_timing() {
    // 100ms per sample, threshold 0.02, silence window 150ms. Speech starts
    // on the first strictly-above-threshold sample (index 2); 0.01 at index
    // 4 already counts as silence, so the window runs out at index 6 and the
    // segment spans samples 2 through 5.
    let samples = [0.0, 0.0, 0.05, 0.06, 0.01, 0.0, 0.0];
    let (start, end, segment_samples) = run_script(
        &samples,
        Duration::from_millis(100),
        0.02,
        Duration::from_millis(150),
        10,
    );

    assert_eq!(start, Some(2));
    assert_eq!(end, Some(6));
    assert_eq!(segment_samples, 4 * 10);
}

#[test]
fn speech_end_never_fires_early() {
    // Last voiced sample at index 3; silence begins at index 4. With a
    // 150ms window and 100ms ticks the earliest legal end is index 6.
    let samples = [0.0, 0.05, 0.05, 0.05, 0.0, 0.0, 0.0, 0.0];
    let (_, end, _) = run_script(
        &samples,
        Duration::from_millis(100),
        0.02,
        Duration::from_millis(150),
        10,
    );

    assert_eq!(end, Some(6));
}

#[test]
fn sample_exactly_at_threshold_is_silence() {
    let samples = [0.02, 0.02, 0.02];
    let (start, _, _) = run_script(
        &samples,
        Duration::from_millis(100),
        0.02,
        Duration::from_millis(150),
        10,
    );

    assert!(start.is_none());
}

#[test]
fn rms_of_generated_audio() {
    let loud = common::sine(440.0, 0.1, 0.5, DEFAULT_SAMPLE_RATE);
    let quiet = common::silence(0.1, DEFAULT_SAMPLE_RATE);

    // A 0.5-amplitude sine has RMS near 0.35.
    assert!(rms(&loud) > 0.3);
    assert!(rms(&quiet) < 0.001);
}

#[test]
fn finalized_segment_round_trips_through_wav() {
    let mut recorder = SegmentRecorder::new(DEFAULT_SAMPLE_RATE);
    recorder.begin();
    recorder.append(&common::sine(440.0, 0.05, 0.5, DEFAULT_SAMPLE_RATE));
    recorder.append(&common::sine(220.0, 0.05, 0.5, DEFAULT_SAMPLE_RATE));
    let segment = recorder.finalize().unwrap();

    assert_eq!(&segment.wav[0..4], b"RIFF");
    assert_eq!(&segment.wav[8..12], b"WAVE");

    let mut reader = hound::WavReader::new(Cursor::new(segment.wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, DEFAULT_SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(read_samples.len(), segment.samples);
}

#[test]
fn wav_encoding_clamps_out_of_range_samples() {
    let wav = samples_to_wav(&[2.0, -2.0], DEFAULT_SAMPLE_RATE).unwrap();
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples, vec![32767, -32768]);
}

/// Scripted input source for monitor-level tests
struct ScriptedInput {
    sink: Arc<Mutex<Option<InputSink>>>,
    acquisitions: Arc<AtomicUsize>,
}

impl ScriptedInput {
    fn new() -> (Self, Arc<Mutex<Option<InputSink>>>, Arc<AtomicUsize>) {
        let sink = Arc::new(Mutex::new(None));
        let acquisitions = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sink: Arc::clone(&sink),
                acquisitions: Arc::clone(&acquisitions),
            },
            sink,
            acquisitions,
        )
    }
}

impl InputSource for ScriptedInput {
    fn acquire(&mut self, sink: InputSink) -> murmur::Result<()> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn release(&mut self) {
        *self.sink.lock().unwrap() = None;
    }
}

/// Input source standing in for a denied or absent device
struct DeniedInput;

impl InputSource for DeniedInput {
    fn acquire(&mut self, _sink: InputSink) -> murmur::Result<()> {
        Err(Error::DeviceUnavailable("permission denied".to_string()))
    }

    fn release(&mut self) {}
}

fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        threshold: 0.02,
        silence_delay: Duration::from_millis(40),
        ..MonitorConfig::default()
    }
}

#[test]
fn double_start_acquires_the_device_once() {
    let (source, _sink, acquisitions) = ScriptedInput::new();
    let mut monitor = AudioMonitor::new(Box::new(source), monitor_config());

    monitor.start().unwrap();
    monitor.start().unwrap();
    assert!(monitor.is_active());
    assert_eq!(acquisitions.load(Ordering::SeqCst), 1);

    monitor.stop();
}

#[test]
fn unavailable_device_fails_start_cleanly() {
    let mut monitor = AudioMonitor::new(Box::new(DeniedInput), monitor_config());

    let err = monitor.start().unwrap_err();
    assert!(matches!(err, Error::DeviceUnavailable(_)));
    assert!(!monitor.is_active());

    // The failed session left nothing behind; stop is a harmless no-op.
    monitor.stop();
}

#[test]
fn double_stop_emits_no_duplicate_events() {
    let (source, sink, _) = ScriptedInput::new();
    let mut monitor = AudioMonitor::new(Box::new(source), monitor_config());
    let events = monitor.events();

    monitor.start().unwrap();

    // A complete utterance: speech, then silence past the window.
    {
        let guard = sink.lock().unwrap();
        let sink = guard.as_ref().unwrap();
        sink.deliver(InputEvent::Frame(vec![0.5; 256]));
        sink.deliver(InputEvent::Chunk(vec![0.5; 256]));
    }
    std::thread::sleep(Duration::from_millis(60));
    {
        let guard = sink.lock().unwrap();
        let sink = guard.as_ref().unwrap();
        sink.deliver(InputEvent::Frame(vec![0.0; 256]));
        sink.deliver(InputEvent::Chunk(vec![0.0; 256]));
        sink.deliver(InputEvent::Frame(vec![0.0; 256]));
        sink.deliver(InputEvent::Chunk(vec![0.0; 256]));
    }
    std::thread::sleep(Duration::from_millis(100));
    {
        let guard = sink.lock().unwrap();
        let sink = guard.as_ref().unwrap();
        sink.deliver(InputEvent::Frame(vec![0.0; 256]));
    }
    std::thread::sleep(Duration::from_millis(50));

    monitor.stop();
    monitor.stop();

    let mut speech_ends = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, MonitorEvent::SpeechEnd(_)) {
            speech_ends += 1;
        }
    }
    assert_eq!(speech_ends, 1);
}

#[test]
fn segment_covers_speech_interval_without_gaps() {
    let (source, sink, _) = ScriptedInput::new();
    let mut monitor = AudioMonitor::new(Box::new(source), monitor_config());
    let events = monitor.events();

    monitor.start().unwrap();

    // Three voiced chunks of distinct sizes, then silence to finalize.
    let chunk_sizes = [100usize, 250, 175];
    {
        let guard = sink.lock().unwrap();
        let sink = guard.as_ref().unwrap();
        for &size in &chunk_sizes {
            sink.deliver(InputEvent::Frame(vec![0.5; size]));
            sink.deliver(InputEvent::Chunk(vec![0.5; size]));
        }
    }
    std::thread::sleep(Duration::from_millis(60));
    {
        let guard = sink.lock().unwrap();
        let sink = guard.as_ref().unwrap();
        sink.deliver(InputEvent::Frame(vec![0.0; 64]));
        sink.deliver(InputEvent::Chunk(vec![0.0; 64]));
    }
    std::thread::sleep(Duration::from_millis(60));
    {
        let guard = sink.lock().unwrap();
        let sink = guard.as_ref().unwrap();
        sink.deliver(InputEvent::Frame(vec![0.0; 64]));
    }
    std::thread::sleep(Duration::from_millis(50));
    monitor.stop();

    let segment = std::iter::from_fn(|| events.try_recv().ok())
        .find_map(|event| match event {
            MonitorEvent::SpeechEnd(segment) => Some(segment),
            _ => None,
        })
        .expect("utterance was not finalized");

    // Every chunk between speech-start and speech-end is present: the three
    // voiced chunks plus the silence chunk inside the debounce window.
    let expected: usize = chunk_sizes.iter().sum::<usize>() + 64;
    assert_eq!(segment.samples, expected);
}
