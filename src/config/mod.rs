//! Configuration management for the assistant and the backend relay
//!
//! Precedence, lowest to highest: built-in defaults, `allie.toml`, then
//! environment variables.

pub mod file;

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::persona::PersonalityMode;
use crate::{Error, Result};

pub use file::AllieConfigFile;

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
const DEFAULT_PORT: u16 = 3000;

/// Full configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant (client side) settings
    pub client: ClientConfig,

    /// Backend relay settings
    pub relay: RelayConfig,
}

/// Assistant settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend relay
    pub backend_url: String,

    /// Language code used for transcription and replies
    pub language: String,

    /// Starting personality
    pub personality: PersonalityMode,

    /// Directory for recorded clips
    pub recordings_dir: PathBuf,
}

/// Speech-to-text provider behind `/api/transcribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    #[default]
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Parse a provider name
    ///
    /// # Errors
    ///
    /// Returns `Config` error for unknown providers
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

/// Text-to-speech provider behind `/api/synthesize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

impl TtsProvider {
    /// Parse a provider name
    ///
    /// # Errors
    ///
    /// Returns `Config` error for unknown providers
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" | "eleven_labs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }

    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::OpenAi => "nova",
            // "Rachel"
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttProvider,
    pub model: String,
}

/// Text-to-speech settings
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    pub model: String,
    pub voice: String,
    /// Speed multiplier (0.25 to 4.0)
    pub speed: f64,
}

/// API keys for upstream services, never logged
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` (Whisper, chat, TTS)
    pub openai: Option<SecretString>,

    /// `Deepgram` (optional STT)
    pub deepgram: Option<SecretString>,

    /// `ElevenLabs` (optional TTS)
    pub elevenlabs: Option<SecretString>,

    /// `OpenWeatherMap`
    pub openweather: Option<SecretString>,

    /// The Odds API
    pub odds: Option<SecretString>,
}

/// Upstream base URLs, overridable for self-hosted proxies and tests
#[derive(Debug, Clone)]
pub struct Upstreams {
    pub openai: String,
    pub deepgram: String,
    pub elevenlabs: String,
    pub openweather: String,
    pub odds: String,
}

impl Default for Upstreams {
    fn default() -> Self {
        Self {
            openai: "https://api.openai.com/v1".to_string(),
            deepgram: "https://api.deepgram.com/v1".to_string(),
            elevenlabs: "https://api.elevenlabs.io/v1".to_string(),
            openweather: "https://api.openweathermap.org/data/2.5".to_string(),
            odds: "https://api.the-odds-api.com/v4".to_string(),
        }
    }
}

/// Backend relay settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port to listen on
    pub port: u16,

    /// Schedule database path
    pub db_path: PathBuf,

    /// Global requests-per-minute limit; `None` disables limiting
    pub rate_limit_rpm: Option<u32>,

    pub stt: SttConfig,
    pub tts: TtsConfig,

    /// Chat completion model
    pub chat_model: String,

    pub api_keys: ApiKeys,
    pub upstreams: Upstreams,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file is unreadable or a value is invalid
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("ALLIE_CONFIG").ok().map(PathBuf::from);
        let fc = file::load_config_file(explicit.as_deref())?;
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns `Config` error for invalid values
    pub fn resolve(fc: AllieConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let secret = |key: &str, file: Option<String>| var(key).or(file).map(SecretString::from);

        let data_dir = data_dir();

        // Client
        let personality = var("ALLIE_PERSONALITY")
            .or(fc.client.personality)
            .map_or_else(PersonalityMode::default, |s| PersonalityMode::from_str(&s));
        let client = ClientConfig {
            backend_url: var("ALLIE_BACKEND_URL")
                .or(fc.client.backend_url)
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            language: var("ALLIE_LANGUAGE")
                .or(fc.client.language)
                .unwrap_or_else(|| "en".to_string()),
            personality,
            recordings_dir: var("ALLIE_RECORDINGS_DIR")
                .or(fc.client.recordings_dir)
                .map_or_else(|| data_dir.join("recordings"), PathBuf::from),
        };

        // Relay
        let port = match var("ALLIE_PORT").or_else(|| var("PORT")) {
            Some(s) => parse_number::<u16>("port", &s)?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };
        let rate_limit_rpm = match var("ALLIE_RATE_LIMIT_RPM") {
            Some(s) => parse_number::<u32>("rate limit", &s)?,
            None => fc.server.rate_limit_rpm.unwrap_or(0),
        };

        let stt_provider = var("ALLIE_STT_PROVIDER")
            .or(fc.stt.provider)
            .map(|s| SttProvider::from_str(&s))
            .transpose()?
            .unwrap_or_default();
        let stt = SttConfig {
            provider: stt_provider,
            model: var("ALLIE_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
        };

        let tts_provider = var("ALLIE_TTS_PROVIDER")
            .or(fc.tts.provider)
            .map(|s| TtsProvider::from_str(&s))
            .transpose()?
            .unwrap_or_default();
        let speed = match var("ALLIE_TTS_SPEED") {
            Some(s) => parse_number::<f64>("TTS speed", &s)?,
            None => fc.tts.speed.unwrap_or(1.0),
        };
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "TTS speed must be between 0.25 and 4.0, got {speed}"
            )));
        }
        let tts = TtsConfig {
            provider: tts_provider,
            model: var("ALLIE_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            voice: var("ALLIE_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            speed,
        };

        let api_keys = ApiKeys {
            openai: secret("OPENAI_API_KEY", fc.api_keys.openai),
            deepgram: secret("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
            elevenlabs: secret("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
            openweather: secret("OPENWEATHER_API_KEY", fc.api_keys.openweather),
            odds: secret("ODDS_API_KEY", fc.api_keys.odds),
        };

        let defaults = Upstreams::default();
        let upstreams = Upstreams {
            openai: var("OPENAI_BASE_URL")
                .or(fc.upstreams.openai)
                .unwrap_or(defaults.openai),
            deepgram: var("DEEPGRAM_BASE_URL")
                .or(fc.upstreams.deepgram)
                .unwrap_or(defaults.deepgram),
            elevenlabs: var("ELEVENLABS_BASE_URL")
                .or(fc.upstreams.elevenlabs)
                .unwrap_or(defaults.elevenlabs),
            openweather: var("OPENWEATHER_BASE_URL")
                .or(fc.upstreams.openweather)
                .unwrap_or(defaults.openweather),
            odds: var("ODDS_API_BASE_URL")
                .or(fc.upstreams.odds)
                .unwrap_or(defaults.odds),
        };

        let relay = RelayConfig {
            port,
            db_path: var("ALLIE_DB_PATH")
                .or(fc.server.db_path)
                .map_or_else(|| data_dir.join("schedule.db"), PathBuf::from),
            rate_limit_rpm: (rate_limit_rpm > 0).then_some(rate_limit_rpm),
            stt,
            tts,
            chat_model: var("ALLIE_CHAT_MODEL")
                .or(fc.chat.model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api_keys,
            upstreams,
        };

        Ok(Self { client, relay })
    }
}

/// Platform data directory (`~/.local/share/allie` on Linux)
#[must_use]
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "hello-allie", "allie")
        .map_or_else(|| PathBuf::from(".allie"), |d| d.data_dir().to_path_buf())
}

/// Create `path`'s parent directory if it has one
///
/// # Errors
///
/// Returns error if the directory cannot be created
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {what}: {raw}")))
}
