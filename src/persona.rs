//! Personality modes
//!
//! A personality only shapes the style instruction sent with chat
//! completions. It never affects intent routing.

use serde::{Deserialize, Serialize};

/// Assistant name used in the system prompt
pub const ASSISTANT_NAME: &str = "Allie";

/// Conversational style selected by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityMode {
    #[default]
    Friendly,
    Sassy,
    Motivational,
    Humorous,
}

impl PersonalityMode {
    /// All modes, in menu order
    pub const ALL: [Self; 4] = [
        Self::Friendly,
        Self::Sassy,
        Self::Motivational,
        Self::Humorous,
    ];

    /// Parse from string representation
    ///
    /// Unknown names fall back to `Friendly`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "sassy" => Self::Sassy,
            "motivational" => Self::Motivational,
            "humorous" | "funny" => Self::Humorous,
            _ => Self::Friendly,
        }
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Sassy => "sassy",
            Self::Motivational => "motivational",
            Self::Humorous => "humorous",
        }
    }

    /// Style instruction for this mode
    #[must_use]
    pub const fn style(self) -> &'static str {
        match self {
            Self::Friendly => "Be warm, kind and encouraging, like a helpful friend.",
            Self::Sassy => {
                "Be playful and a little sassy, with witty comebacks, but never mean."
            }
            Self::Motivational => {
                "Be an upbeat motivational coach. Encourage the user and keep energy high."
            }
            Self::Humorous => "Be lighthearted and funny. Work a joke or pun into answers.",
        }
    }

    /// Greeting Allie gives when this mode is picked
    #[must_use]
    pub const fn intro(self) -> &'static str {
        match self {
            Self::Friendly => "Hey there! Let's make this a great chat!",
            Self::Sassy => "Oh honey, buckle up. You picked the best version of me.",
            Self::Motivational => "Let's get to work. You've got greatness to unlock.",
            Self::Humorous => {
                "Why did the AI cross the road? To answer your questions, duh!"
            }
        }
    }
}

impl std::fmt::Display for PersonalityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the chat system prompt for a mode and reply language
#[must_use]
pub fn system_prompt(mode: PersonalityMode, language: Option<&str>) -> String {
    let mut prompt = format!(
        "You are {ASSISTANT_NAME}, a voice assistant. {} \
         Keep responses short and conversational: they are read aloud.",
        mode.style()
    );

    if let Some(lang) = language.filter(|l| !l.is_empty() && *l != "en") {
        prompt.push_str(&format!(" Reply in the language with code \"{lang}\"."));
    }

    prompt
}
