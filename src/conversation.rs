//! Conversation turn state machine
//!
//! One turn runs `Idle → Recording → Transcribing → Routing → Dispatching →
//! Speaking → Idle`. A [`Canceller`] can interrupt the turn from any other
//! task while it is transcribing, routing, dispatching or speaking; the turn
//! then settles in `Idle` and any result that arrives later is dropped.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::client::Transcriber;
use crate::intent::IntentRouter;
use crate::orchestrator::{Reply, ResponseOrchestrator};
use crate::persona::PersonalityMode;
use crate::voice::{
    AudioCaptureSession, Microphone, SpeechCanceller, SpeechOptions, SpeechOutcome,
    SpeechPlayback,
};

/// Where the current turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Recording,
    Transcribing,
    Routing,
    Dispatching,
    Speaking,
    Cancelled,
}

impl TurnState {
    /// States a user cancellation may interrupt
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::Transcribing | Self::Routing | Self::Dispatching | Self::Speaking
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::Routing => "routing",
            Self::Dispatching => "dispatching",
            Self::Speaking => "speaking",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A reply was produced
    Replied {
        transcript: String,
        reply: Reply,
        /// `None` when speech is disabled or failed
        speech: Option<SpeechOutcome>,
    },
    /// Transcription failed or heard nothing; no reply attempted
    NoTranscript,
    /// The user cancelled before a reply was produced
    Cancelled,
}

/// Turn identity shared with cancellers
#[derive(Default)]
struct TurnTracker {
    current: AtomicU64,
    token: Mutex<CancellationToken>,
}

impl TurnTracker {
    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        (id, token)
    }

    fn is_current(&self, id: u64) -> bool {
        self.current.load(Ordering::SeqCst) == id
    }

    /// Invalidate the running turn
    fn cancel(&self) -> u64 {
        let stale = self.current.fetch_add(1, Ordering::SeqCst);
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        stale
    }
}

/// Cloneable handle that interrupts the running turn from any task
#[derive(Clone)]
pub struct Canceller {
    turns: Arc<TurnTracker>,
    state: Arc<watch::Sender<TurnState>>,
    speech: Option<SpeechCanceller>,
}

impl Canceller {
    /// Cancel the running turn and return to `Idle`
    ///
    /// Returns `false` when there is nothing to cancel.
    pub fn cancel(&self) -> bool {
        let state = *self.state.borrow();
        if !state.is_cancellable() {
            return false;
        }

        let turn = self.turns.cancel();
        if let Some(speech) = &self.speech {
            speech.cancel();
        }
        self.state.send_replace(TurnState::Cancelled);
        self.state.send_replace(TurnState::Idle);
        tracing::info!(turn, from = %state, "turn cancelled");
        true
    }
}

/// Drives one conversation: capture, transcription, routing, reply, speech
pub struct Conversation<M> {
    capture: AudioCaptureSession<M>,
    transcriber: Arc<dyn Transcriber>,
    router: IntentRouter,
    orchestrator: ResponseOrchestrator,
    speech: Option<(Arc<SpeechPlayback>, SpeechOptions)>,
    language: String,
    turns: Arc<TurnTracker>,
    state: Arc<watch::Sender<TurnState>>,
}

impl<M: Microphone> Conversation<M> {
    /// Create a conversation without spoken replies
    pub fn new(
        capture: AudioCaptureSession<M>,
        transcriber: Arc<dyn Transcriber>,
        orchestrator: ResponseOrchestrator,
        language: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(TurnState::Idle);
        Self {
            capture,
            transcriber,
            router: IntentRouter::new(),
            orchestrator,
            speech: None,
            language: language.into(),
            turns: Arc::new(TurnTracker::default()),
            state: Arc::new(state),
        }
    }

    /// Speak replies through `speech`
    #[must_use]
    pub fn with_speech(mut self, speech: Arc<SpeechPlayback>, options: SpeechOptions) -> Self {
        self.speech = Some((speech, options));
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    /// Handle for cancelling from another task
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        Canceller {
            turns: Arc::clone(&self.turns),
            state: Arc::clone(&self.state),
            speech: self.speech.as_ref().map(|(speech, _)| speech.canceller()),
        }
    }

    /// Response orchestrator (history, personality)
    #[must_use]
    pub const fn orchestrator(&self) -> &ResponseOrchestrator {
        &self.orchestrator
    }

    /// Mutable response orchestrator
    pub const fn orchestrator_mut(&mut self) -> &mut ResponseOrchestrator {
        &mut self.orchestrator
    }

    /// Switch personality and greet in the new mode
    ///
    /// The greeting is spoken when speech is enabled but is not recorded in
    /// history.
    pub async fn switch_personality(&mut self, mode: PersonalityMode) -> &'static str {
        self.orchestrator.set_mode(mode);
        let intro = mode.intro();

        if let Some((playback, options)) = &self.speech {
            if let Err(e) = playback.speak(intro, options).await {
                tracing::warn!(mode = %mode, error = %e, "mode greeting not spoken");
            }
        }
        intro
    }

    /// Tear the session down: drop any recording and forget history and
    /// pending selections
    pub fn end_session(&mut self) {
        self.abort_recording();
        self.orchestrator.reset();
        tracing::info!("session ended");
    }

    /// Begin capturing a turn
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRecording`, `PermissionDenied` or an audio error
    pub fn start_recording(&mut self) -> Result<()> {
        self.capture.start()?;
        self.transition(TurnState::Recording);
        Ok(())
    }

    /// Discard the active recording (session torn down mid-capture)
    pub fn abort_recording(&mut self) -> bool {
        let aborted = self.capture.abort();
        if aborted {
            self.transition(TurnState::Idle);
        }
        aborted
    }

    /// Stop recording and run the rest of the turn
    ///
    /// Transcription failures end the turn quietly; every other failure
    /// becomes a spoken apology.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveRecording` if no recording was started, or an
    /// audio/io error if the clip cannot be written
    pub async fn finish_turn(&mut self) -> Result<TurnOutcome> {
        let clip = match self.capture.stop() {
            Ok(clip) => clip,
            Err(e) => {
                self.transition(TurnState::Idle);
                return Err(e);
            }
        };

        let (turn, token) = self.turns.begin();
        self.transition(TurnState::Transcribing);

        let transcribed = guarded(&token, self.transcriber.transcribe(&clip, &self.language)).await;
        clip.discard();
        let Some(transcribed) = transcribed.filter(|_| self.turns.is_current(turn)) else {
            tracing::debug!(turn, "transcription discarded");
            return Ok(self.cancelled());
        };

        let transcript = match transcribed {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::info!(turn, "nothing heard");
                self.transition(TurnState::Idle);
                return Ok(TurnOutcome::NoTranscript);
            }
            Err(e) => {
                tracing::warn!(turn, error = %e, "transcription failed");
                self.transition(TurnState::Idle);
                return Ok(TurnOutcome::NoTranscript);
            }
        };

        Ok(self.respond(turn, &token, transcript).await)
    }

    /// Run a typed utterance through routing, dispatch and speech
    pub async fn submit_text(&mut self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::NoTranscript;
        }

        let (turn, token) = self.turns.begin();
        self.respond(turn, &token, text.to_string()).await
    }

    async fn respond(&mut self, turn: u64, token: &CancellationToken, transcript: String) -> TurnOutcome {
        self.transition(TurnState::Routing);
        let intent = self
            .router
            .classify(&transcript, self.orchestrator.has_pending_selection());
        tracing::info!(turn, intent = intent.kind(), "routed");

        if !self.turns.is_current(turn) {
            return self.cancelled();
        }
        self.transition(TurnState::Dispatching);

        let reply = guarded(token, self.orchestrator.handle(&transcript, intent)).await;
        let Some(reply) = reply.filter(|_| self.turns.is_current(turn)) else {
            tracing::debug!(turn, "reply discarded");
            return self.cancelled();
        };

        let speech = match &self.speech {
            Some((playback, options)) => {
                self.transition(TurnState::Speaking);
                if self.turns.is_current(turn) {
                    match playback.speak(&reply.speech(), options).await {
                        Ok(outcome) => Some(outcome),
                        Err(e) => {
                            tracing::warn!(turn, error = %e, "speech failed");
                            None
                        }
                    }
                } else {
                    Some(SpeechOutcome::Cancelled)
                }
            }
            None => None,
        };

        // Also settles a cancel that raced the transition into speaking
        self.transition(TurnState::Idle);

        TurnOutcome::Replied {
            transcript,
            reply,
            speech,
        }
    }

    /// End a cancelled turn; a cancel racing a transition may have left a
    /// later state behind
    fn cancelled(&self) -> TurnOutcome {
        self.transition(TurnState::Idle);
        TurnOutcome::Cancelled
    }

    fn transition(&self, next: TurnState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::trace!(from = %prev, to = %next, "turn state");
        }
    }
}

/// Run `fut` unless `token` fires first
async fn guarded<T>(token: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => None,
        out = fut => Some(out),
    }
}
