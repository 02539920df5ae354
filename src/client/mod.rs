//! Assistant-side clients for the backend relay
//!
//! The orchestrator and turn state machine only see the capability traits
//! defined here; [`BackendClient`] implements all of them over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::protocol::{
    ChatRequest, ResultResponse, ScheduleDeleteRequest, ScheduleRequest, ScheduleResponse,
    SportsRequest, SportsResponse, SynthesizeRequest, TranscribeResponse, WeatherRequest,
};
use crate::sports::{Game, StatType};
use crate::voice::{AudioClip, SpeechOptions};
use crate::{Error, Result};

/// Default request timeout for backend calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recorded clip
    ///
    /// # Errors
    ///
    /// Returns `TranscriptionFailed` on network error or non-success status
    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String>;
}

/// Downstream capabilities the orchestrator dispatches to
#[async_trait]
pub trait Capabilities: Send + Sync {
    /// Current conditions for a city, as one sentence
    async fn weather(&self, city: &str) -> Result<String>;

    /// Game matching a team and stat request, if any
    async fn sports(&self, team: &str, stat: StatType) -> Result<Option<Game>>;

    /// Run a scheduling command
    async fn schedule(&self, prompt: &str) -> Result<ScheduleResponse>;

    /// Delete a schedule entry by identifier
    async fn delete_schedule(&self, id: &str) -> Result<ScheduleResponse>;

    /// Chat completion with history and personality
    async fn chat(&self, request: &ChatRequest) -> Result<String>;
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize text to MP3 bytes
    async fn synthesize(&self, text: &str, options: &SpeechOptions) -> Result<Vec<u8>>;
}

/// HTTP client for the backend relay
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a client for a relay base URL (e.g. `http://localhost:3000`)
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
        })
    }

    /// Base URL of the relay
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// POST a JSON body and decode a JSON response
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path, error = %e, "backend request failed");
                Error::downstream(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(path, status = %status, body = %body, "backend error");
            return Err(Error::DownstreamCallFailed(format!(
                "{path} returned {status}: {body}"
            )));
        }

        response.json().await.map_err(|e| {
            tracing::warn!(path, error = %e, "failed to parse backend response");
            Error::downstream(e)
        })
    }
}

#[async_trait]
impl Transcriber for BackendClient {
    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String> {
        tracing::debug!(path = %clip.path.display(), language, "uploading audio for transcription");

        let audio = tokio::fs::read(&clip.path)
            .await
            .map_err(|e| Error::TranscriptionFailed(format!("failed to read recording: {e}")))?;

        let file_name = clip
            .path
            .file_name()
            .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned());

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .map_err(|e| Error::TranscriptionFailed(e.to_string()))?,
            )
            .text("language", language.to_string());

        let response = self
            .client
            .post(self.endpoint("api/transcribe")?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription error");
            return Err(Error::TranscriptionFailed(format!("status {status}: {body}")));
        }

        let result: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[async_trait]
impl Capabilities for BackendClient {
    async fn weather(&self, city: &str) -> Result<String> {
        let response: ResultResponse = self
            .post_json(
                "api/weather",
                &WeatherRequest {
                    city: city.to_string(),
                },
            )
            .await?;
        Ok(response.result)
    }

    async fn sports(&self, team: &str, stat: StatType) -> Result<Option<Game>> {
        let response: SportsResponse = self
            .post_json(
                "api/sports",
                &SportsRequest {
                    team: team.to_string(),
                    stat_type: stat,
                },
            )
            .await?;
        Ok(response.game)
    }

    async fn schedule(&self, prompt: &str) -> Result<ScheduleResponse> {
        self.post_json(
            "api/schedule",
            &ScheduleRequest {
                prompt: prompt.to_string(),
            },
        )
        .await
    }

    async fn delete_schedule(&self, id: &str) -> Result<ScheduleResponse> {
        self.post_json(
            "api/schedule/delete",
            &ScheduleDeleteRequest { id: id.to_string() },
        )
        .await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let response: ResultResponse = self.post_json("api/smart", request).await?;
        Ok(response.result)
    }
}

#[async_trait]
impl Synthesizer for BackendClient {
    async fn synthesize(&self, text: &str, options: &SpeechOptions) -> Result<Vec<u8>> {
        let request = SynthesizeRequest {
            text: text.to_string(),
            voice: options.voice.clone(),
            speed: options.speed,
            language: options.language.clone(),
        };

        let response = self
            .client
            .post(self.endpoint("api/synthesize")?)
            .json(&request)
            .send()
            .await
            .map_err(Error::downstream)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("synthesis error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(Error::downstream)?;
        Ok(audio.to_vec())
    }
}
