//! Transcript intent classification
//!
//! Deterministic, case-insensitive substring matching evaluated in a fixed
//! precedence order. Ties go to the first match in list order, not to the
//! most specific phrase.

use std::sync::LazyLock;

use regex::Regex;

use crate::schedule::DELETE_WORDS;
use crate::sports::{self, StatType};

/// Index used for numeric replies that cannot name any candidate ("0",
/// or numbers too large to represent)
pub const OUT_OF_RANGE: usize = usize::MAX;

/// Matches "weather in <city>" anywhere in a transcript
static WEATHER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bweather\s+in\s+(.+)$").expect("valid regex"));

/// Phrases that mark a scheduling command
const SCHEDULE_KEYWORDS: &[&str] = &[
    "remind",
    "schedule",
    "calendar",
    "show schedule",
    "list schedule",
    "delete",
    "remove",
];

/// Classified purpose of a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Numeric reply to a pending disambiguation prompt (0-based)
    DeleteConfirmation { index: usize },
    /// "weather in <city>"
    WeatherQuery { city: String },
    /// Team keyword plus a stat keyword
    SportsQuery { team: String, stat: StatType },
    /// Reminder / calendar command, passed through verbatim
    ScheduleCommand { text: String, is_delete: bool },
    /// Anything else goes to the language model
    GeneralChat { text: String },
}

impl Intent {
    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DeleteConfirmation { .. } => "delete_confirmation",
            Self::WeatherQuery { .. } => "weather",
            Self::SportsQuery { .. } => "sports",
            Self::ScheduleCommand { .. } => "schedule",
            Self::GeneralChat { .. } => "chat",
        }
    }
}

/// Keyword-based intent router
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentRouter;

impl IntentRouter {
    /// Create a router
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classify a transcript
    ///
    /// `has_pending_selection` reports whether a disambiguation prompt is
    /// waiting for a numeric answer.
    #[must_use]
    pub fn classify(&self, text: &str, has_pending_selection: bool) -> Intent {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        if has_pending_selection {
            if let Some(index) = parse_selection(trimmed) {
                return Intent::DeleteConfirmation { index };
            }
        }

        if let Some(city) = weather_city(trimmed) {
            return Intent::WeatherQuery { city };
        }

        if let Some(team) = sports::find_team(&lower) {
            if let Some(stat) = StatType::detect(&lower) {
                return Intent::SportsQuery {
                    team: team.key.to_string(),
                    stat,
                };
            }
        }

        if SCHEDULE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return Intent::ScheduleCommand {
                text: trimmed.to_string(),
                is_delete: DELETE_WORDS.iter().any(|k| lower.contains(k)),
            };
        }

        Intent::GeneralChat {
            text: trimmed.to_string(),
        }
    }
}

/// Parse a purely numeric reply ("2", "2.") into a 0-based index
fn parse_selection(text: &str) -> Option<usize> {
    let digits = text.trim_end_matches(['.', '!', '?']).trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let index = digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .unwrap_or(OUT_OF_RANGE);
    Some(index)
}

/// Extract the city from "weather in <city>", keeping its original casing
fn weather_city(text: &str) -> Option<String> {
    let caps = WEATHER_REGEX.captures(text)?;
    let city = caps
        .get(1)?
        .as_str()
        .trim()
        .trim_end_matches(['?', '.', '!', ','])
        .trim();

    if city.is_empty() {
        None
    } else {
        Some(city.to_string())
    }
}
