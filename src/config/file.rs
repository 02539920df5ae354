//! TOML configuration file loading
//!
//! Supports `allie.toml` in the platform config directory (or the path in
//! `ALLIE_CONFIG`). Every field is optional; the file overlays defaults and
//! is itself overridden by environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllieConfigFile {
    /// Assistant client settings
    #[serde(default)]
    pub client: ClientFileConfig,

    /// Backend relay settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Speech-to-text settings
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech settings
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Chat completion settings
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Upstream API keys
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Upstream base URL overrides
    #[serde(default)]
    pub upstreams: UpstreamsFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Relay base URL (e.g. "http://localhost:3000")
    pub backend_url: Option<String>,
    /// Language code for transcription and replies
    pub language: Option<String>,
    /// Personality mode ("friendly", "sassy", ...)
    pub personality: Option<String>,
    /// Where recorded clips are written
    pub recordings_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    /// Schedule database path
    pub db_path: Option<String>,
    /// Global requests-per-minute limit (0 disables)
    pub rate_limit_rpm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "openai" or "elevenlabs"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub openweather: Option<String>,
    pub odds: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamsFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub openweather: Option<String>,
    pub odds: Option<String>,
}

/// Load the TOML config file
///
/// An explicit path must exist; the default path is optional and yields
/// `AllieConfigFile::default()` when absent.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<AllieConfigFile> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(AllieConfigFile::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = parse(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error on invalid TOML or unknown keys
pub fn parse(content: &str) -> Result<AllieConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the default config file path (`~/.config/allie/allie.toml` on Linux)
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "hello-allie", "allie")
        .map(|d| d.config_dir().join("allie.toml"))
}
