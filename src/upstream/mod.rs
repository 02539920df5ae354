//! Upstream API adapters used by the backend relay
//!
//! Each adapter owns its key and base URL. Keys come from server-side
//! configuration only and never reach the assistant client.

pub mod chat;
pub mod odds;
pub mod stt;
pub mod tts;
pub mod weather;

pub use chat::ChatCompletion;
pub use odds::OddsClient;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use weather::WeatherClient;

use secrecy::SecretString;

use crate::{Error, Result};

/// Join a base URL and a path without doubling slashes
fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Require a configured key
fn require_key(key: Option<&SecretString>, what: &str) -> Result<SecretString> {
    key.cloned()
        .ok_or_else(|| Error::Config(format!("{what} API key not configured")))
}
