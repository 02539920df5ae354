//! Hello Allie - voice assistant conversation orchestrator
//!
//! The assistant side records a spoken turn, transcribes it through the
//! backend relay, routes the transcript to a capability (weather, sports,
//! schedule or open chat) and speaks the reply back. The relay side is an
//! HTTP server that holds every upstream API key and proxies speech, chat,
//! weather and odds providers, plus a local schedule book.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Assistant                         │
//! │  Capture │ Conversation │ Intent │ Orchestrator │ TTS │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP (no keys)
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Backend relay                       │
//! │  /api/transcribe │ /api/smart │ /api/weather │ ...   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTPS (server-side keys)
//! ┌────────────────────▼────────────────────────────────┐
//! │   OpenAI │ Deepgram │ ElevenLabs │ OpenWeather │ Odds │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod history;
pub mod intent;
pub mod orchestrator;
pub mod persona;
pub mod protocol;
pub mod schedule;
pub mod sports;
pub mod upstream;
pub mod voice;

pub use client::{BackendClient, Capabilities, Synthesizer, Transcriber};
pub use config::{ClientConfig, Config, RelayConfig};
pub use conversation::{Canceller, Conversation, TurnOutcome, TurnState};
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use history::{ConversationHistory, Turn, TurnRole};
pub use intent::{Intent, IntentRouter};
pub use orchestrator::{Reply, ResponseOrchestrator};
pub use persona::PersonalityMode;
pub use schedule::{ScheduleCommand, ScheduleService};
