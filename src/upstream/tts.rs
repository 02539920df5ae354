//! Text-to-speech (TTS) processing

use secrecy::{ExposeSecret, SecretString};

use super::{endpoint, require_key};
use crate::config::{RelayConfig, TtsProvider};
use crate::{Error, Result};

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f64,
    model: String,
    base_url: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance for the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(client: reqwest::Client, config: &RelayConfig) -> Result<Self> {
        let keys = &config.api_keys;
        let (api_key, base_url) = match config.tts.provider {
            TtsProvider::OpenAi => (
                require_key(keys.openai.as_ref(), "OpenAI")?,
                config.upstreams.openai.clone(),
            ),
            TtsProvider::ElevenLabs => (
                require_key(keys.elevenlabs.as_ref(), "ElevenLabs")?,
                config.upstreams.elevenlabs.clone(),
            ),
        };

        Ok(Self {
            client,
            api_key,
            voice: config.tts.voice.clone(),
            speed: config.tts.speed,
            model: config.tts.model.clone(),
            base_url,
            provider: config.tts.provider,
        })
    }

    /// Active provider
    #[must_use]
    pub const fn provider(&self) -> TtsProvider {
        self.provider
    }

    /// Synthesize text to MP3 audio
    ///
    /// `voice` and `speed` override the configured defaults. `language` is a
    /// voice locale such as `es-MX`; only `ElevenLabs` v2.5 models take it,
    /// other voices follow the language of the text.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        speed: Option<f64>,
        language: Option<&str>,
    ) -> Result<Vec<u8>> {
        let voice = voice.unwrap_or(&self.voice);
        match self.provider {
            TtsProvider::OpenAi => {
                self.synthesize_openai(text, voice, speed.unwrap_or(self.speed))
                    .await
            }
            TtsProvider::ElevenLabs => {
                let language_code = language.and_then(|l| elevenlabs_language(&self.model, l));
                self.synthesize_elevenlabs(text, voice, language_code).await
            }
        }
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(&self, text: &str, voice: &str, speed: f64) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: speed.clamp(0.25, 4.0),
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "audio/speech"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesized speech");
        Ok(audio.to_vec())
    }

    /// Synthesize using `ElevenLabs` TTS
    async fn synthesize_elevenlabs(
        &self,
        text: &str,
        voice_id: &str,
        language_code: Option<&str>,
    ) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            language_code: Option<&'a str>,
        }

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            language_code,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, &format!("text-to-speech/{voice_id}")))
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesized speech");
        Ok(audio.to_vec())
    }
}

/// Two-letter language code for models that accept one
fn elevenlabs_language<'a>(model: &str, locale: &'a str) -> Option<&'a str> {
    if !model.ends_with("_v2_5") {
        return None;
    }
    locale.split('-').next().filter(|code| code.len() == 2)
}
