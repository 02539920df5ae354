//! Recording sessions
//!
//! At most one recording is active at a time. Starting flips the audio
//! route to recording; stopping or aborting flips it back to playback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::capture::{Microphone, write_wav};
use super::routing::{AudioMode, AudioRouting};
use crate::{Error, Result};

/// A finished recording on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// WAV file path
    pub path: PathBuf,
    /// Sample rate of the file
    pub sample_rate: u32,
    /// Recorded duration
    pub duration: Duration,
}

impl AudioClip {
    /// Delete the clip once it has been transcribed
    pub fn discard(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove clip");
        }
    }
}

/// An in-progress recording
#[derive(Debug, Clone, Copy)]
struct ActiveRecording {
    id: Uuid,
    started_at: Instant,
}

/// Wraps a microphone with permission, routing and single-session rules
pub struct AudioCaptureSession<M> {
    microphone: M,
    routing: Arc<dyn AudioRouting>,
    recordings_dir: PathBuf,
    active: Option<ActiveRecording>,
}

impl<M: Microphone> AudioCaptureSession<M> {
    /// Create a capture session writing clips under `recordings_dir`
    pub fn new(
        microphone: M,
        routing: Arc<dyn AudioRouting>,
        recordings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            microphone,
            routing,
            recordings_dir: recordings_dir.into(),
            active: None,
        }
    }

    /// Start recording
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRecording` if a recording is active, `PermissionDenied`
    /// if microphone access is refused, or an audio error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::AlreadyRecording);
        }

        if !self.microphone.request_permission() {
            tracing::warn!("microphone permission denied");
            return Err(Error::PermissionDenied);
        }

        self.routing.set_mode(AudioMode::Recording);
        if let Err(e) = self.microphone.begin() {
            self.routing.set_mode(AudioMode::Playback);
            return Err(e);
        }

        let recording = ActiveRecording {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
        };
        tracing::info!(recording_id = %recording.id, "recording started");
        self.active = Some(recording);
        Ok(())
    }

    /// Stop recording and write the clip to disk
    ///
    /// # Errors
    ///
    /// Returns `NoActiveRecording` if nothing is being recorded, or an
    /// audio/io error if the clip cannot be finalized
    pub fn stop(&mut self) -> Result<AudioClip> {
        let recording = self.active.take().ok_or(Error::NoActiveRecording)?;

        let samples = self.microphone.end();
        self.routing.set_mode(AudioMode::Playback);
        let samples = samples?;

        let sample_rate = self.microphone.sample_rate();
        std::fs::create_dir_all(&self.recordings_dir)?;
        let path = self.recordings_dir.join(format!("{}.wav", recording.id));
        write_wav(&path, &samples, sample_rate)?;

        let duration = recording.started_at.elapsed();
        tracing::info!(
            recording_id = %recording.id,
            path = %path.display(),
            samples = samples.len(),
            duration_ms = duration.as_millis(),
            "recording stopped"
        );

        Ok(AudioClip {
            path,
            sample_rate,
            duration,
        })
    }

    /// Discard an active recording without producing a clip
    ///
    /// Returns `true` if a recording was discarded.
    pub fn abort(&mut self) -> bool {
        let Some(recording) = self.active.take() else {
            return false;
        };

        if let Err(e) = self.microphone.end() {
            tracing::debug!(error = %e, "error while discarding recording");
        }
        self.routing.set_mode(AudioMode::Playback);
        tracing::info!(recording_id = %recording.id, "recording discarded");
        true
    }

    /// Whether a recording is in progress
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Access the underlying microphone
    #[must_use]
    pub const fn microphone(&self) -> &M {
        &self.microphone
    }
}
