//! Native microphone capture via `cpal`.
//!
//! [`CpalBackend`] opens the system default input device. The cpal callback
//! runs on a dedicated audio thread, downmixes each buffer to mono and appends
//! it as 16-bit little-endian PCM to a shared buffer; [`CaptureDevice::take_chunk`]
//! drains that buffer. On stop the chunks are wrapped into a WAV file with
//! `hound`, so `audio/wav` is the only type this backend supports.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::blob::MimeType;
use super::session::{CaptureBackend, CaptureDevice, RecorderError};

const WAV_MIME: &str = "audio/wav";

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

impl From<cpal::DefaultStreamConfigError> for RecorderError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                RecorderError::DeviceUnavailable(e.to_string())
            }
            other => RecorderError::Backend(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for RecorderError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                RecorderError::DeviceUnavailable(e.to_string())
            }
            other => RecorderError::Backend(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for RecorderError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => {
                RecorderError::DeviceUnavailable(e.to_string())
            }
            other => RecorderError::Backend(other.to_string()),
        }
    }
}

impl From<hound::Error> for RecorderError {
    fn from(e: hound::Error) -> Self {
        RecorderError::Encode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// Capture backend for the system default input device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for CpalBackend {
    fn is_type_supported(&self, mime: &str) -> bool {
        MimeType::named(mime).essence() == Some(WAV_MIME)
    }

    fn acquire(&self, _mime: &MimeType) -> Result<Box<dyn CaptureDevice>, RecorderError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            RecorderError::DeviceUnavailable("no input device on the default audio host".into())
        })?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let pcm: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&pcm);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = downmix(data, channels);
                if let Ok(mut buf) = sink.lock() {
                    for sample in mono {
                        let s = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        buf.extend_from_slice(&s.to_le_bytes());
                    }
                }
            },
            |err: cpal::StreamError| {
                log::error!("recorder: cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::debug!("recorder: cpal stream open ({sample_rate} Hz, {channels} ch)");
        Ok(Box::new(CpalDevice {
            stream: Some(stream),
            pcm,
            sample_rate,
        }))
    }
}

// ---------------------------------------------------------------------------
// CpalDevice
// ---------------------------------------------------------------------------

struct CpalDevice {
    stream: Option<cpal::Stream>,
    pcm: Arc<Mutex<Vec<u8>>>,
    sample_rate: u32,
}

impl CaptureDevice for CpalDevice {
    fn take_chunk(&mut self) -> Result<Vec<u8>, RecorderError> {
        let mut buf = self
            .pcm
            .lock()
            .map_err(|_| RecorderError::Backend("capture buffer lock poisoned".into()))?;
        Ok(std::mem::take(&mut *buf))
    }

    fn finalize(&self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, RecorderError> {
        encode_wav(&chunks, self.sample_rate)
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("recorder: failed to pause stream: {e}");
            }
            // dropping the stream closes the device
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Average interleaved channels down to mono.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => samples
            .chunks_exact(n as usize)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Wrap little-endian PCM16 mono chunks into a WAV file.
fn encode_wav(chunks: &[Vec<u8>], sample_rate: u32) -> Result<Vec<u8>, RecorderError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for chunk in chunks {
            for pair in chunk.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
