//! JSON bodies exchanged between the assistant and the backend relay

use serde::{Deserialize, Serialize};

use crate::history::{Turn, TurnRole};
use crate::persona::PersonalityMode;
use crate::sports::{Game, StatType};

/// `POST /api/transcribe` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// A prior turn sent as chat context
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryMessage {
    pub role: TurnRole,
    pub content: String,
}

impl From<&Turn> for HistoryMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// `POST /api/smart` and `POST /api/generate` request
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PersonalityMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Single-string result used by chat and weather endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultResponse {
    pub result: String,
}

/// `POST /api/weather` request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherRequest {
    pub city: String,
}

/// `POST /api/schedule` request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleRequest {
    pub prompt: String,
}

/// `POST /api/schedule/delete` request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleDeleteRequest {
    pub id: String,
}

/// A schedule entry offered for disambiguation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleOption {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl ScheduleOption {
    /// Human-readable label ("dentist (tomorrow at 3pm)")
    #[must_use]
    pub fn label(&self) -> String {
        match &self.when {
            Some(when) if !when.is_empty() => format!("{} ({when})", self.title),
            _ => self.title.clone(),
        }
    }
}

/// Response of the schedule endpoints
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScheduleResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ScheduleOption>>,
}

/// `POST /api/sports` request
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SportsRequest {
    pub team: String,
    pub stat_type: StatType,
}

/// `POST /api/sports` response; `game` is absent when nothing matched
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SportsResponse {
    #[serde(default)]
    pub game: Option<Game>,
}

/// `POST /api/synthesize` request
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Voice locale, e.g. `es-MX`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Error envelope returned by the relay
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
