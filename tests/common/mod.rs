//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use allie::client::{Capabilities, Synthesizer, Transcriber};
use allie::protocol::{ChatRequest, ScheduleOption, ScheduleResponse};
use allie::sports::{Game, StatType};
use allie::voice::{
    AudioCaptureSession, AudioClip, AudioOutput, Microphone, ModeSwitch, SpeechOptions,
    SpeechPlayback,
};
use allie::{
    Conversation, ConversationHistory, DbPool, Error, ResponseOrchestrator, Result, db,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Microphone that always yields a short clip
pub struct FakeMic {
    pub allowed: bool,
}

impl Microphone for FakeMic {
    fn request_permission(&mut self) -> bool {
        self.allowed
    }

    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<Vec<f32>> {
        Ok(vec![0.0, 0.1, -0.1, 0.2, -0.2, 0.0])
    }

    fn sample_rate(&self) -> u32 {
        16000
    }
}

/// Transcriber returning a fixed transcript (or failing) after a delay
pub struct MockTranscriber {
    pub text: Option<String>,
    pub delay: Duration,
}

impl MockTranscriber {
    pub fn says(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            delay: Duration::ZERO,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            delay: Duration::ZERO,
        })
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            delay,
        })
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, clip: &AudioClip, _language: &str) -> Result<String> {
        assert!(clip.path.exists(), "clip should be on disk");
        tokio::time::sleep(self.delay).await;
        self.text
            .clone()
            .ok_or_else(|| Error::TranscriptionFailed("status 500".to_string()))
    }
}

/// Scripted downstream capabilities that record every call
#[derive(Default)]
pub struct MockCapabilities {
    pub calls: Mutex<Vec<String>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub schedule_responses: Mutex<VecDeque<ScheduleResponse>>,
    pub chat_reply: Option<String>,
    pub chat_delay: Duration,
    pub weather_fails: bool,
    pub game: Option<Game>,
}

impl MockCapabilities {
    pub fn chatty(reply: &str) -> Self {
        Self {
            chat_reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    pub fn queue_schedule(&self, response: ScheduleResponse) {
        self.schedule_responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Capabilities for MockCapabilities {
    async fn weather(&self, city: &str) -> Result<String> {
        self.record(format!("weather:{city}"));
        if self.weather_fails {
            return Err(Error::DownstreamCallFailed("weather returned 502".to_string()));
        }
        Ok(format!("It's 72°F in {city} with clear sky."))
    }

    async fn sports(&self, team: &str, stat: StatType) -> Result<Option<Game>> {
        self.record(format!("sports:{team}:{stat}"));
        Ok(self.game.clone())
    }

    async fn schedule(&self, prompt: &str) -> Result<ScheduleResponse> {
        self.record(format!("schedule:{prompt}"));
        self.schedule_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::DownstreamCallFailed("no scripted response".to_string()))
    }

    async fn delete_schedule(&self, id: &str) -> Result<ScheduleResponse> {
        self.record(format!("delete:{id}"));
        Ok(ScheduleResponse {
            message: format!("Deleted {id}."),
            options: None,
        })
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.record(format!("chat:{}", request.prompt));
        self.chat_requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.chat_delay).await;
        self.chat_reply
            .clone()
            .ok_or_else(|| Error::DownstreamCallFailed("chat returned 500".to_string()))
    }
}

/// Synthesizer that returns the text bytes as "audio"
pub struct EchoSynth;

#[async_trait]
impl Synthesizer for EchoSynth {
    async fn synthesize(&self, text: &str, _options: &SpeechOptions) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

/// Output that "plays" for a fixed time, stopping early on cancel
pub struct TimedOutput {
    pub duration: Duration,
    pub played: Mutex<Vec<String>>,
}

impl TimedOutput {
    pub fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            played: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AudioOutput for TimedOutput {
    async fn play_mp3(&self, audio: Vec<u8>, cancel: CancellationToken) -> Result<()> {
        self.played
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&audio).into_owned());
        tokio::select! {
            () = tokio::time::sleep(self.duration) => {}
            () = cancel.cancelled() => {}
        }
        Ok(())
    }
}

/// Sample schedule option
pub fn option(id: &str, title: &str, when: Option<&str>) -> ScheduleOption {
    ScheduleOption {
        id: id.to_string(),
        title: title.to_string(),
        when: when.map(ToString::to_string),
    }
}

/// Conversation over mocks, without speech
pub fn conversation(
    capabilities: Arc<MockCapabilities>,
    transcriber: Arc<MockTranscriber>,
    recordings: &Path,
) -> Conversation<FakeMic> {
    let capture = AudioCaptureSession::new(
        FakeMic { allowed: true },
        Arc::new(ModeSwitch::new()),
        recordings,
    );
    let orchestrator = ResponseOrchestrator::new(capabilities, ConversationHistory::new());
    Conversation::new(capture, transcriber, orchestrator, "en")
}

/// Conversation over mocks that speaks through `output`
pub fn speaking_conversation(
    capabilities: Arc<MockCapabilities>,
    transcriber: Arc<MockTranscriber>,
    output: Arc<TimedOutput>,
    recordings: &Path,
) -> Conversation<FakeMic> {
    let routing = Arc::new(ModeSwitch::new());
    let playback = SpeechPlayback::new(Arc::new(EchoSynth), output, routing);
    conversation(capabilities, transcriber, recordings)
        .with_speech(Arc::new(playback), SpeechOptions::default())
}
