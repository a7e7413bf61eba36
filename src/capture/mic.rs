//! Microphone input
//!
//! Opens the default input device at 16 kHz mono and accumulates samples
//! into a ring that the session drains on its capture tick. Where an
//! utterance begins and ends is the endpointer's decision; this type only
//! moves audio.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture sample rate, matching what Whisper expects
pub const SAMPLE_RATE: u32 = 16000;

/// Default input device feeding a drainable sample ring
pub struct Microphone {
    device: Device,
    config: StreamConfig,
    ring: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl Microphone {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error when no input device is present, or when none of its
    /// configurations supports 16 kHz mono.
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Capture("no input device present".to_string()))?;
        let config = mono_input_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            rate = SAMPLE_RATE,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            ring: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Begin streaming samples into the ring. No-op while already live.
    ///
    /// # Errors
    ///
    /// Returns error when the input stream cannot be built or started.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let ring = Arc::clone(&self.ring);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |chunk: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut ring) = ring.lock() {
                        ring.extend_from_slice(chunk);
                    }
                },
                |err| tracing::error!(error = %err, "input stream error"),
                None,
            )
            .map_err(|e| Error::Capture(e.to_string()))?;
        stream.play().map_err(|e| Error::Capture(e.to_string()))?;

        self.stream = Some(stream);
        tracing::debug!("microphone live");
        Ok(())
    }

    /// Stop streaming. Samples already in the ring stay until drained.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("microphone stopped");
        }
    }

    /// Take everything captured since the last drain
    ///
    /// Callers that only want to discard stale audio drop the result.
    pub fn drain(&self) -> Vec<f32> {
        self.ring
            .lock()
            .map(|mut ring| std::mem::take(&mut *ring))
            .unwrap_or_default()
    }

    /// Whether the input stream is running
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.stream.is_some()
    }
}

/// Find a mono input configuration that spans the capture rate
fn mono_input_config(device: &Device) -> Result<StreamConfig> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::Capture(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| {
            Error::Capture(format!("input device does not support {SAMPLE_RATE} Hz mono"))
        })?;

    Ok(supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config())
}

/// Encode captured samples as 16-bit mono WAV for the transcription API
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn encode_wav(samples: &[f32]) -> Result<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(
            &mut cursor,
            hound::WavSpec {
                channels: 1,
                sample_rate: SAMPLE_RATE,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
        )
        .map_err(|e| Error::Capture(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(quantized)
                .map_err(|e| Error::Capture(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Capture(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
