//! Spoken replies
//!
//! `speak` resolves when playback finishes on its own or is cancelled.
//! Cancellation goes through a shared control block so it can be triggered
//! from another task while `speak` is pending.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use super::playback::AudioOutput;
use super::routing::{AudioMode, AudioRouting};
use crate::Result;
use crate::client::Synthesizer;

/// Voice parameters for synthesis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechOptions {
    /// Voice identifier (provider specific)
    pub voice: Option<String>,
    /// Speed multiplier
    pub speed: Option<f64>,
    /// Voice locale, e.g. `es-MX`
    pub language: Option<String>,
}

impl SpeechOptions {
    /// Options whose voice locale follows the reply language code
    #[must_use]
    pub fn for_language(language: &str) -> Self {
        Self {
            language: Some(voice_locale(language).to_string()),
            ..Self::default()
        }
    }
}

/// Voice locale for a reply language code; anything unknown speaks `en-US`
#[must_use]
pub fn voice_locale(language: &str) -> &'static str {
    match language.trim().to_ascii_lowercase().as_str() {
        "es" | "es-mx" => "es-MX",
        _ => "en-US",
    }
}

/// How a `speak` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Playback reached the end
    Finished,
    /// `cancel()` stopped playback
    Cancelled,
}

/// State shared between a playback and its cancellers
struct PlaybackControl {
    routing: Arc<dyn AudioRouting>,
    next_id: AtomicU64,
    current: Mutex<Option<(u64, CancellationToken)>>,
}

impl PlaybackControl {
    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((id, token.clone()));
        if let Some((_, prev)) = previous {
            prev.cancel();
        }

        self.routing.set_mode(AudioMode::Playback);
        (id, token)
    }

    /// Natural end of playback `id`; restores the recording route
    fn finish(&self, id: u64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(cur, _)| *cur == id) {
            *current = None;
            drop(current);
            self.routing.set_mode(AudioMode::Recording);
        }
    }

    fn cancel(&self) -> bool {
        let taken = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match taken {
            Some((id, token)) => {
                token.cancel();
                self.routing.set_mode(AudioMode::Recording);
                tracing::debug!(playback_id = id, "speech cancelled");
                true
            }
            None => false,
        }
    }

    fn is_speaking(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Cloneable handle that stops speech from anywhere
#[derive(Clone)]
pub struct SpeechCanceller {
    control: Arc<PlaybackControl>,
}

impl SpeechCanceller {
    /// Stop current speech; no-op when nothing plays
    ///
    /// Returns `true` if something was playing.
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }
}

/// Text-to-speech playback with cancellation
pub struct SpeechPlayback {
    synthesizer: Arc<dyn Synthesizer>,
    output: Arc<dyn AudioOutput>,
    control: Arc<PlaybackControl>,
}

impl SpeechPlayback {
    /// Create a playback pipeline
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        output: Arc<dyn AudioOutput>,
        routing: Arc<dyn AudioRouting>,
    ) -> Self {
        Self {
            synthesizer,
            output,
            control: Arc::new(PlaybackControl {
                routing,
                next_id: AtomicU64::new(1),
                current: Mutex::new(None),
            }),
        }
    }

    /// Speak text, resolving when playback finishes or is cancelled
    ///
    /// Starting a new utterance cancels any utterance still playing.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<SpeechOutcome> {
        if text.trim().is_empty() {
            return Ok(SpeechOutcome::Finished);
        }

        let (id, token) = self.control.begin();
        tracing::debug!(playback_id = id, chars = text.len(), "speaking");

        let playback = async {
            let audio = self.synthesizer.synthesize(text, options).await?;
            self.output.play_mp3(audio, token.clone()).await
        };

        let result = tokio::select! {
            biased;
            () = token.cancelled() => Ok(SpeechOutcome::Cancelled),
            played = playback => played.map(|()| {
                if token.is_cancelled() {
                    SpeechOutcome::Cancelled
                } else {
                    SpeechOutcome::Finished
                }
            }),
        };

        self.control.finish(id);
        result
    }

    /// Stop current speech; no-op when nothing plays
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    /// Whether an utterance is in progress
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.control.is_speaking()
    }

    /// Handle for cancelling from another task
    #[must_use]
    pub fn canceller(&self) -> SpeechCanceller {
        SpeechCanceller {
            control: Arc::clone(&self.control),
        }
    }
}
