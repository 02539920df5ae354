//! Chat completions for open-ended replies

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{endpoint, require_key};
use crate::config::RelayConfig;
use crate::history::TurnRole;
use crate::persona;
use crate::protocol::ChatRequest;
use crate::{Error, Result};

/// Replies are spoken, so keep them short
const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `OpenAI`-compatible chat completion client
pub struct ChatCompletion {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl ChatCompletion {
    /// Create a chat client from relay configuration
    ///
    /// # Errors
    ///
    /// Returns error if the `OpenAI` API key is missing
    pub fn from_config(client: reqwest::Client, config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            client,
            api_key: require_key(config.api_keys.openai.as_ref(), "OpenAI")?,
            model: config.chat_model.clone(),
            base_url: config.upstreams.openai.clone(),
        })
    }

    /// Model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reply in character, with prior turns as context
    ///
    /// # Errors
    ///
    /// Returns error if the upstream call fails or returns no text
    pub async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let mode = request.mode.unwrap_or_default();
        let system = persona::system_prompt(mode, request.language.as_deref());

        let mut messages = Vec::with_capacity(request.conversation_history.len() + 2);
        messages.push(Message {
            role: "system",
            content: &system,
        });
        messages.extend(request.conversation_history.iter().map(|m| Message {
            role: role_name(m.role),
            content: &m.content,
        }));
        messages.push(Message {
            role: "user",
            content: &request.prompt,
        });

        tracing::debug!(
            mode = %mode,
            context_turns = request.conversation_history.len(),
            "requesting chat completion"
        );
        self.send(messages).await
    }

    /// Plain completion without personality or history
    ///
    /// # Errors
    ///
    /// Returns error if the upstream call fails or returns no text
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.send(vec![Message {
            role: "user",
            content: prompt,
        }])
        .await
    }

    async fn send(&self, messages: Vec<Message<'_>>) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::DownstreamCallFailed(format!(
                "chat API error {status}: {body}"
            )));
        }

        let parsed: CompletionResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::DownstreamCallFailed("empty chat completion".to_string()))?;

        tracing::info!(chars = text.len(), "chat completion received");
        Ok(text)
    }
}

const fn role_name(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    }
}
