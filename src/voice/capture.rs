//! Microphone capture

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Preferred capture rate (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Platform microphone
///
/// Implementations need not be `Send`: platform streams are usually pinned
/// to the thread that opened them.
pub trait Microphone {
    /// Ask for access to the microphone; `false` means denied
    fn request_permission(&mut self) -> bool;

    /// Begin capturing into an internal buffer
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be started
    fn begin(&mut self) -> Result<()>;

    /// Stop capturing and return mono samples captured since `begin`
    ///
    /// # Errors
    ///
    /// Returns error if the device failed while recording
    fn end(&mut self) -> Result<Vec<f32>>;

    /// Sample rate of the returned samples
    fn sample_rate(&self) -> u32;
}

/// Microphone backed by the default cpal input device
pub struct CpalMicrophone {
    device: Option<(Device, StreamConfig)>,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl CpalMicrophone {
    /// Create an unopened microphone; the device is opened on permission
    #[must_use]
    pub fn new() -> Self {
        Self {
            device: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        }
    }

    /// Open the default input device, preferring mono 16kHz
    fn open() -> Result<(Device, StreamConfig)> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let preferred = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)).config());

        // Fall back to whatever the device offers and downmix in the callback
        let config = match preferred {
            Some(config) => config,
            None => device
                .default_input_config()
                .map_err(|e| Error::Audio(e.to_string()))?
                .config(),
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "microphone opened"
        );

        Ok((device, config))
    }

    /// Peek at captured samples without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear captured samples
    pub fn clear_buffer(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

impl Microphone for CpalMicrophone {
    fn request_permission(&mut self) -> bool {
        if self.device.is_some() {
            return true;
        }

        match Self::open() {
            Ok(opened) => {
                self.device = Some(opened);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "microphone unavailable");
                false
            }
        }
    }

    fn begin(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (device, config) = self.device.as_ref().ok_or(Error::PermissionDenied)?;
        let channels = usize::from(config.channels.max(1));

        self.clear_buffer();
        let buffer = Arc::clone(&self.buffer);

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        if channels == 1 {
                            buf.extend_from_slice(data);
                        } else {
                            #[allow(clippy::cast_precision_loss)]
                            buf.extend(
                                data.chunks(channels)
                                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                            );
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn end(&mut self) -> Result<Vec<f32>> {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }

        Ok(self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default())
    }

    fn sample_rate(&self) -> u32 {
        self.device
            .as_ref()
            .map_or(SAMPLE_RATE, |(_, config)| config.sample_rate.0)
    }
}

/// Write mono f32 samples as a 16-bit PCM WAV file
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| Error::Audio(e.to_string()))?;

    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }

    writer.finalize().map_err(|e| Error::Audio(e.to_string()))
}

/// Root-mean-square energy of a block of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
