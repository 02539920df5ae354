//! Response orchestration
//!
//! Owns the session-scoped conversation state (history, personality,
//! pending selection) and turns a classified intent into one reply. Every
//! downstream failure is converted into an apology so the conversation
//! never stops on an error.

use std::sync::Arc;

use crate::client::Capabilities;
use crate::history::{ConversationHistory, Turn, TurnRole};
use crate::intent::Intent;
use crate::persona::PersonalityMode;
use crate::protocol::{ChatRequest, HistoryMessage, ScheduleOption};
use crate::sports::{self, StatType};
use crate::Error;

/// Spoken when chat completion fails
pub const CHAT_FAILURE: &str = "Sorry, something went wrong on my end. Please try again.";

/// Spoken when a numeric reply names no candidate
pub const INVALID_SELECTION: &str =
    "That isn't one of the options, so I didn't delete anything.";

const SPORTS_APOLOGY: &str = "Sorry, I couldn't get sports info right now.";
const SCHEDULE_APOLOGY: &str = "Sorry, I couldn't reach your schedule right now.";

/// Display and speech payload for one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text shown to the user and recorded in history
    pub text: String,
    /// Candidates awaiting a numeric choice, if any
    pub options: Option<Vec<ScheduleOption>>,
}

impl Reply {
    /// Plain text reply
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: None,
        }
    }

    /// Text with pictographs removed, suitable for speech synthesis
    #[must_use]
    pub fn speech(&self) -> String {
        speakable_text(&self.text)
    }
}

/// Dispatches intents and keeps per-session conversation state
pub struct ResponseOrchestrator {
    capabilities: Arc<dyn Capabilities>,
    history: ConversationHistory,
    mode: PersonalityMode,
    language: Option<String>,
    pending: Option<Vec<ScheduleOption>>,
}

impl ResponseOrchestrator {
    /// Create an orchestrator over a capability provider and a history log
    pub fn new(capabilities: Arc<dyn Capabilities>, history: ConversationHistory) -> Self {
        Self {
            capabilities,
            history,
            mode: PersonalityMode::default(),
            language: None,
            pending: None,
        }
    }

    /// Set the personality used for chat completions
    #[must_use]
    pub const fn with_mode(mut self, mode: PersonalityMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the reply language code
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Current personality
    #[must_use]
    pub const fn mode(&self) -> PersonalityMode {
        self.mode
    }

    /// Change personality
    pub fn set_mode(&mut self, mode: PersonalityMode) {
        tracing::info!(mode = %mode, "personality changed");
        self.mode = mode;
    }

    /// Reply language code
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Conversation history handle
    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Candidates awaiting a numeric reply
    #[must_use]
    pub fn pending_selection(&self) -> Option<&[ScheduleOption]> {
        self.pending.as_deref()
    }

    /// Whether a numeric reply is expected
    #[must_use]
    pub const fn has_pending_selection(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget history and any pending selection
    pub fn reset(&mut self) {
        self.pending = None;
        self.history.clear();
    }

    /// Produce a reply for an intent and record the exchange in history
    pub async fn handle(&mut self, transcript: &str, intent: Intent) -> Reply {
        // A pending selection only survives into the very next turn
        if !matches!(intent, Intent::DeleteConfirmation { .. }) && self.pending.take().is_some() {
            tracing::debug!("pending selection discarded");
        }

        tracing::debug!(intent = intent.kind(), "dispatching");
        let reply = match intent {
            Intent::WeatherQuery { city } => self.weather(&city).await,
            Intent::SportsQuery { team, stat } => self.sports(&team, stat).await,
            Intent::ScheduleCommand { text, is_delete } => self.schedule(&text, is_delete).await,
            Intent::DeleteConfirmation { index } => self.confirm_delete(index).await,
            Intent::GeneralChat { text } => self.chat(&text).await,
        };

        self.history.append(Turn::now(TurnRole::User, transcript));
        self.history.append(Turn::now(TurnRole::Assistant, reply.text.clone()));
        reply
    }

    async fn weather(&self, city: &str) -> Reply {
        match self.capabilities.weather(city).await {
            Ok(report) => Reply::text(report),
            Err(e) => {
                tracing::warn!(city, error = %e, "weather lookup failed");
                Reply::text(format!("Sorry, I couldn't get the weather for {city} right now."))
            }
        }
    }

    async fn sports(&self, team_key: &str, stat: StatType) -> Reply {
        let Some(team) = sports::team(team_key) else {
            tracing::warn!(team = team_key, "unknown team");
            return Reply::text(SPORTS_APOLOGY);
        };

        match self.capabilities.sports(team.key, stat).await {
            Ok(Some(game)) => Reply::text(sports::format_game(team, stat, &game)),
            Ok(None) => Reply::text(sports::no_game_message(team, stat)),
            Err(e) => {
                tracing::warn!(team = team.key, stat = %stat, error = %e, "sports lookup failed");
                Reply::text(SPORTS_APOLOGY)
            }
        }
    }

    async fn schedule(&mut self, text: &str, is_delete: bool) -> Reply {
        let response = match self.capabilities.schedule(text).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "schedule command failed");
                return Reply::text(SCHEDULE_APOLOGY);
            }
        };

        // A multi-option answer is a question the next turn may answer
        match response.options {
            Some(options) if options.len() > 1 => {
                let text = format!("{} {}", response.message, enumerate(&options));
                tracing::debug!(candidates = options.len(), is_delete, "awaiting selection");
                self.pending = Some(options.clone());
                Reply {
                    text,
                    options: Some(options),
                }
            }
            _ => Reply::text(response.message),
        }
    }

    async fn confirm_delete(&mut self, index: usize) -> Reply {
        let candidates = self.pending.take().unwrap_or_default();

        let Some(choice) = candidates.get(index) else {
            let err = Error::InvalidSelection {
                index,
                available: candidates.len(),
            };
            tracing::info!(error = %err, "rejected selection");
            return Reply::text(INVALID_SELECTION);
        };

        match self.capabilities.delete_schedule(&choice.id).await {
            Ok(response) => Reply::text(response.message),
            Err(e) => {
                tracing::warn!(id = %choice.id, error = %e, "schedule delete failed");
                Reply::text(SCHEDULE_APOLOGY)
            }
        }
    }

    async fn chat(&self, text: &str) -> Reply {
        let request = ChatRequest {
            prompt: text.to_string(),
            conversation_history: self
                .history
                .snapshot()
                .iter()
                .map(HistoryMessage::from)
                .collect(),
            mode: Some(self.mode),
            language: self.language.clone(),
        };

        match self.capabilities.chat(&request).await {
            Ok(result) if !result.trim().is_empty() => Reply::text(result.trim()),
            Ok(_) => {
                tracing::warn!("chat completion returned no text");
                Reply::text(CHAT_FAILURE)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat completion failed");
                Reply::text(CHAT_FAILURE)
            }
        }
    }
}

/// "1) first 2) second" for a spoken choice
fn enumerate(options: &[ScheduleOption]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, opt)| format!("{}) {}", i + 1, opt.label()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a character can't be read aloud (emoji and pictographs)
const fn is_unspeakable(c: char) -> bool {
    matches!(
        c,
        '\u{1F000}'..='\u{1FAFF}'
            | '\u{2600}'..='\u{27BF}'
            | '\u{2B00}'..='\u{2BFF}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{E0020}'..='\u{E007F}'
            | '\u{200D}'
            | '\u{20E3}'
            | '\u{3030}'
            | '\u{303D}'
            | '\u{3297}'
            | '\u{3299}'
    )
}

/// Remove pictographic symbols and collapse the whitespace they leave
#[must_use]
pub fn speakable_text(text: &str) -> String {
    text.chars()
        .filter(|&c| !is_unspeakable(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
