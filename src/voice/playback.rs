//! Speaker output for synthesized speech

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Sample rate assumed when a stream carries no header (common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays encoded speech audio
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play MP3 audio until it finishes or `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    async fn play_mp3(&self, audio: Vec<u8>, cancel: CancellationToken) -> Result<()>;
}

/// Decoded mono PCM
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio on the default cpal output device
///
/// Each call opens its own stream on a blocking thread, since cpal streams
/// cannot cross threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalSpeaker;

impl CpalSpeaker {
    /// Create a speaker
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Play raw samples until done or cancelled
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    pub async fn play_pcm(&self, pcm: Pcm, cancel: CancellationToken) -> Result<()> {
        if pcm.samples.is_empty() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut handle = tokio::task::spawn_blocking({
            let stop = Arc::clone(&stop);
            move || play_blocking(&pcm, &stop)
        });

        let joined = tokio::select! {
            joined = &mut handle => joined,
            () = cancel.cancelled() => {
                stop.store(true, Ordering::SeqCst);
                handle.await
            }
        };

        joined.map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

#[async_trait]
impl AudioOutput for CpalSpeaker {
    async fn play_mp3(&self, audio: Vec<u8>, cancel: CancellationToken) -> Result<()> {
        let pcm = decode_mp3(&audio)?;
        self.play_pcm(pcm, cancel).await
    }
}

/// Find an output config at the given rate, mono first then stereo
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    for channels in [1, 2] {
        let found = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            });
        if let Some(config) = found {
            return Ok(config.with_sample_rate(rate).config());
        }
    }
    Err(Error::Audio(format!("no output config supports {sample_rate} Hz")))
}

/// Play samples on the current thread, polling for completion or stop
fn play_blocking(pcm: &Pcm, stop: &AtomicBool) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device, pcm.sample_rate)?;
    let channels = usize::from(config.channels.max(1));

    let samples: Arc<[f32]> = pcm.samples.clone().into();
    let position = Arc::new(AtomicUsize::new(0));

    let stream = device
        .build_output_stream(
            &config,
            {
                let samples = Arc::clone(&samples);
                let position = Arc::clone(&position);
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (samples.len() as u64 * 1000) / u64::from(pcm.sample_rate.max(1));
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    while position.load(Ordering::Relaxed) < samples.len() {
        if stop.load(Ordering::SeqCst) {
            tracing::debug!("playback stopped early");
            return Ok(());
        }
        if start.elapsed() > timeout {
            tracing::warn!("playback timed out");
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the stream is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate.get_or_insert(u32::try_from(frame.sample_rate).unwrap_or(PLAYBACK_SAMPLE_RATE));
                let channels = frame.channels.max(1);
                #[allow(clippy::cast_precision_loss)]
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    sum / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(Pcm {
        samples,
        sample_rate: sample_rate.unwrap_or(PLAYBACK_SAMPLE_RATE),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_silent() {
        let pcm = decode_mp3(&[]).unwrap();
        assert!(pcm.samples.is_empty());
        assert_eq!(pcm.sample_rate, PLAYBACK_SAMPLE_RATE);
    }

    #[tokio::test]
    async fn test_play_empty_pcm_is_noop() {
        let pcm = Pcm {
            samples: Vec::new(),
            sample_rate: PLAYBACK_SAMPLE_RATE,
        };
        CpalSpeaker::new()
            .play_pcm(pcm, CancellationToken::new())
            .await
            .unwrap();
    }
}
