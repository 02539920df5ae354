//! HTTP relay between the assistant and upstream AI, weather, sports and
//! scheduling services

pub mod assistant;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod schedule;
pub mod sports;
pub mod voice;
pub mod weather;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::RelayConfig;
use crate::db::{DbPool, ScheduleRepo};
use crate::schedule::ScheduleService;
use crate::upstream::{ChatCompletion, OddsClient, SpeechToText, TextToSpeech, WeatherClient};

pub use error::ApiError;

/// Shared state for API handlers
///
/// Upstream adapters are `None` when their key is not configured; the
/// matching endpoints then answer `503 not_configured`.
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub schedule: ScheduleService,
    pub stt: Option<Arc<SpeechToText>>,
    pub tts: Option<Arc<TextToSpeech>>,
    pub chat: Option<Arc<ChatCompletion>>,
    pub weather: Option<Arc<WeatherClient>>,
    pub odds: Option<Arc<OddsClient>>,
    pub rate_limiter: Option<rate_limit::RelayLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    port: u16,
    stt: Option<Arc<SpeechToText>>,
    tts: Option<Arc<TextToSpeech>>,
    chat: Option<Arc<ChatCompletion>>,
    weather: Option<Arc<WeatherClient>>,
    odds: Option<Arc<OddsClient>>,
    rate_limit_rpm: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder with no upstreams
    #[must_use]
    pub const fn new(db: DbPool, port: u16) -> Self {
        Self {
            db,
            port,
            stt: None,
            tts: None,
            chat: None,
            weather: None,
            odds: None,
            rate_limit_rpm: None,
        }
    }

    /// Create a builder with every upstream whose key is configured
    #[must_use]
    pub fn from_config(db: DbPool, config: &RelayConfig) -> Self {
        let http = reqwest::Client::new();

        Self {
            stt: enabled("speech-to-text", SpeechToText::from_config(http.clone(), config)),
            tts: enabled("text-to-speech", TextToSpeech::from_config(http.clone(), config)),
            chat: enabled("chat", ChatCompletion::from_config(http.clone(), config)),
            weather: enabled("weather", WeatherClient::from_config(http.clone(), config)),
            odds: enabled("sports", OddsClient::from_config(http, config)),
            rate_limit_rpm: config.rate_limit_rpm,
            ..Self::new(db, config.port)
        }
    }

    /// Set the speech-to-text adapter
    #[must_use]
    pub fn stt(mut self, stt: SpeechToText) -> Self {
        self.stt = Some(Arc::new(stt));
        self
    }

    /// Set the text-to-speech adapter
    #[must_use]
    pub fn tts(mut self, tts: TextToSpeech) -> Self {
        self.tts = Some(Arc::new(tts));
        self
    }

    /// Set the chat completion adapter
    #[must_use]
    pub fn chat(mut self, chat: ChatCompletion) -> Self {
        self.chat = Some(Arc::new(chat));
        self
    }

    /// Set the weather adapter
    #[must_use]
    pub fn weather(mut self, weather: WeatherClient) -> Self {
        self.weather = Some(Arc::new(weather));
        self
    }

    /// Set the sports adapter
    #[must_use]
    pub fn odds(mut self, odds: OddsClient) -> Self {
        self.odds = Some(Arc::new(odds));
        self
    }

    /// Throttle `/api/*` routes to a shared per-minute quota
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_rpm = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            schedule: ScheduleService::new(ScheduleRepo::new(self.db.clone())),
            db: self.db,
            stt: self.stt,
            tts: self.tts,
            chat: self.chat,
            weather: self.weather,
            odds: self.odds,
            rate_limiter: self.rate_limit_rpm.map(rate_limit::relay_limiter),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// Keep an adapter when its key is configured, logging why it is skipped otherwise
fn enabled<T>(feature: &'static str, adapter: Result<T>) -> Option<Arc<T>> {
    match adapter {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            tracing::warn!(feature, error = %e, "feature disabled");
            None
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        // Only the routes merged so far are throttled
        let router = Router::new()
            .merge(voice::router(self.state.clone()))
            .merge(assistant::router(self.state.clone()))
            .merge(weather::router(self.state.clone()))
            .merge(sports::router(self.state.clone()))
            .merge(schedule::router(self.state.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::throttle,
            ))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        // CORS layer for browser and device clients
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        if self.state.rate_limiter.is_some() {
            tracing::info!("rate limiting active");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}
