//! Utterance segment buffering and encoding
//!
//! Collects raw device chunks between speech-start and speech-end and
//! finalizes them into a single WAV blob. Chunk cadence is independent of
//! the analysis-frame cadence; the recorder just accumulates whatever the
//! device delivers while armed.

use std::time::Duration;

use crate::{Error, Result};

/// One finished utterance, encoded and ready for transcription
#[derive(Debug, Clone)]
pub struct EncodedSegment {
    /// WAV blob (PCM 16-bit mono)
    pub wav: Vec<u8>,
    /// Number of raw samples the blob carries
    pub samples: usize,
    /// Wall-clock span the samples cover
    pub duration: Duration,
}

impl EncodedSegment {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.samples == 0
    }

    const fn empty() -> Self {
        Self {
            wav: Vec::new(),
            samples: 0,
            duration: Duration::ZERO,
        }
    }
}

/// Buffers raw audio chunks for the active utterance
#[derive(Debug)]
pub struct SegmentRecorder {
    chunks: Vec<Vec<f32>>,
    recording: bool,
    sample_rate: u32,
}

impl SegmentRecorder {
    #[must_use]
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            chunks: Vec::new(),
            recording: false,
            sample_rate,
        }
    }

    /// Arm the recorder, discarding any previously buffered chunks.
    pub fn begin(&mut self) {
        self.chunks.clear();
        self.recording = true;
    }

    /// Append one raw chunk. Ignored while unarmed, so stray chunks between
    /// utterances are dropped rather than leaking into the next segment.
    pub fn append(&mut self, chunk: &[f32]) {
        if self.recording && !chunk.is_empty() {
            self.chunks.push(chunk.to_vec());
        }
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    /// Number of samples buffered so far
    #[must_use]
    pub fn buffered_samples(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Disarm, encode everything buffered since `begin` into one WAV blob,
    /// and clear the buffer.
    ///
    /// Safe to call without a prior `begin`: returns an empty segment.
    ///
    /// # Errors
    ///
    /// Returns an error if WAV encoding fails.
    pub fn finalize(&mut self) -> Result<EncodedSegment> {
        self.recording = false;

        let samples: Vec<f32> = self.chunks.drain(..).flatten().collect();
        if samples.is_empty() {
            return Ok(EncodedSegment::empty());
        }

        let wav = samples_to_wav(&samples, self.sample_rate)?;
        #[allow(clippy::cast_precision_loss)]
        let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(self.sample_rate));

        Ok(EncodedSegment {
            wav,
            samples: samples.len(),
            duration,
        })
    }

    /// Disarm and drop the buffer without producing a segment. Used when the
    /// session stops mid-utterance.
    pub fn abort(&mut self) {
        self.recording = false;
        self.chunks.clear();
    }
}

/// Encode f32 samples as a WAV blob (PCM 16-bit mono)
///
/// # Errors
///
/// Returns an error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
