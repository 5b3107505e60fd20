//! Live audio input boundary
//!
//! The monitor depends only on the [`InputSource`] capability pair: a stream
//! of fixed-size analysis frames and a stream of raw device chunks, both cut
//! from the same underlying input. [`CpalInput`] is the hardware
//! implementation; tests drive the monitor with scripted sources instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{Sender, TrySendError};

use crate::{Error, Result};

/// Default sample rate for capture (16 kHz, standard for speech)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default analysis frame size in samples
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Audio delivered by an input source, in capture order.
///
/// A completed analysis frame is delivered before the chunk whose samples
/// completed it, so a transition triggered by a frame can still capture that
/// chunk's audio.
#[derive(Debug)]
pub enum InputEvent {
    /// A fixed-size frame for volume analysis
    Frame(Vec<f32>),
    /// A raw chunk at the device's own granularity, for recording
    Chunk(Vec<f32>),
}

/// Delivery handle handed to an input source on acquire
#[derive(Debug, Clone)]
pub struct InputSink {
    tx: Sender<InputEvent>,
    dropped: Arc<AtomicUsize>,
}

impl InputSink {
    #[must_use]
    pub fn new(tx: Sender<InputEvent>, dropped: Arc<AtomicUsize>) -> Self {
        Self { tx, dropped }
    }

    /// Deliver one event. Never blocks the device callback; events that do
    /// not fit in the channel are counted as dropped.
    pub fn deliver(&self, event: InputEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A live audio input that can be exclusively acquired and released.
///
/// Implementations deliver [`InputEvent`]s into the sink from their own
/// callback context; the processing side drains them one at a time.
pub trait InputSource {
    /// Acquire the device exclusively and begin delivery into `sink`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DeviceUnavailable`] when the device is denied,
    /// busy, or absent, leaving no partial state behind.
    fn acquire(&mut self, sink: InputSink) -> Result<()>;

    /// Stop delivery and release the device. Safe to call repeatedly.
    fn release(&mut self);

    /// Source description for logs
    fn describe(&self) -> String {
        "input".to_string()
    }
}

/// List input device names on the default host
///
/// # Errors
///
/// Returns an error if the host exposes no input devices
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Cuts downmixed mono samples into analysis frames and forwards raw chunks.
///
/// Frames are emitted before the chunk that completed them.
struct FrameCutter {
    frame_size: usize,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    sink: InputSink,
}

impl FrameCutter {
    fn new(frame_size: usize, sink: InputSink) -> Self {
        Self {
            frame_size: frame_size.max(1),
            pending: Vec::with_capacity(frame_size),
            scratch: Vec::new(),
            sink,
        }
    }

    fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        downmix_into(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            self.sink.deliver(InputEvent::Frame(frame));
        }

        let chunk = std::mem::take(&mut self.scratch);
        self.sink.deliver(InputEvent::Chunk(chunk));
    }
}

/// Downmix interleaved multi-channel input to mono while converting to f32
fn downmix_into<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    #[allow(clippy::cast_precision_loss)]
    let divisor = channels as f32;
    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / divisor);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        #[allow(clippy::cast_precision_loss)]
        buf.push(acc / count as f32);
    }
}

/// Captures from a cpal input device
pub struct CpalInput {
    preferred_device: Option<String>,
    sample_rate: u32,
    frame_size: usize,
    stream: Option<cpal::Stream>,
}

impl CpalInput {
    #[must_use]
    pub const fn new(
        preferred_device: Option<String>,
        sample_rate: u32,
        frame_size: usize,
    ) -> Self {
        Self {
            preferred_device,
            sample_rate,
            frame_size,
            stream: None,
        }
    }

    fn open_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();

        match self.preferred_device.as_deref() {
            Some(name) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        Error::DeviceUnavailable(format!("input device '{name}' not found"))
                    })
            }
            None => host
                .default_input_device()
                .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string())),
        }
    }

    fn pick_config(&self, device: &cpal::Device) -> Result<(StreamConfig, SampleFormat)> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.min_sample_rate() <= SampleRate(self.sample_rate)
                    && c.max_sample_rate() >= SampleRate(self.sample_rate)
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable(format!(
                    "no input config supporting {} Hz",
                    self.sample_rate
                ))
            })?;

        let format = supported.sample_format();
        let config = supported
            .with_sample_rate(SampleRate(self.sample_rate))
            .config();
        Ok((config, format))
    }
}

impl InputSource for CpalInput {
    fn acquire(&mut self, sink: InputSink) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let device = self.open_device()?;
        let (config, format) = self.pick_config(&device)?;
        let channels = usize::from(config.channels.max(1));

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            channels,
            ?format,
            "input device acquired"
        );

        let cutter = Arc::new(Mutex::new(FrameCutter::new(self.frame_size, sink)));
        let err_fn = |err| {
            tracing::error!(error = %err, "input stream error");
        };

        let stream = match format {
            SampleFormat::F32 => {
                let cutter = Arc::clone(&cutter);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut cutter) = cutter.lock() {
                            cutter.push(data, channels, |s| s);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let cutter = Arc::clone(&cutter);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut cutter) = cutter.lock() {
                            cutter.push(data, channels, |s| f32::from(s) / 32_768.0);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let cutter = Arc::clone(&cutter);
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut cutter) = cutter.lock() {
                            cutter.push(data, channels, |s| {
                                (f32::from(s) - 32_768.0) / 32_768.0
                            });
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(Error::Audio(format!("unsupported sample format: {other:?}")));
            }
        }
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        self.stream = Some(stream);

        Ok(())
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("input device released");
        }
    }

    fn describe(&self) -> String {
        self.preferred_device
            .clone()
            .unwrap_or_else(|| "default input".to_string())
    }
}
