//! Time-windowed conversation history
//!
//! Turns are kept in arrival order and expire after [`RETENTION`]. A
//! background sweep prunes every [`SWEEP_INTERVAL`]; appends and sweeps share
//! one mutex, so they never interleave destructively.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a turn stays in history
pub const RETENTION: TimeDelta = TimeDelta::minutes(30);

/// How often the background sweep runs
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time
    #[must_use]
    pub fn now(role: TurnRole, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    /// Create a turn with an explicit timestamp
    #[must_use]
    pub fn at(role: TurnRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// Shared, chronologically ordered conversation log
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Arc<Mutex<Vec<Turn>>>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end
    pub fn append(&self, turn: Turn) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(turn);
    }

    /// Remove every turn older than the retention window
    ///
    /// Returns the number of turns removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - RETENTION;
        let mut turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
        let before = turns.len();
        turns.retain(|t| t.timestamp >= cutoff);
        before - turns.len()
    }

    /// Ordered copy of the current turns
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of turns currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all turns (session end)
    pub fn clear(&self) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Spawn the periodic sweep on the current runtime
    ///
    /// Runs until `shutdown` is cancelled.
    #[must_use]
    pub fn spawn_pruner(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let history = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = history.prune(Utc::now());
                        if removed > 0 {
                            tracing::debug!(removed, remaining = history.len(), "pruned conversation history");
                        }
                    }
                }
            }
            tracing::trace!("history pruner stopped");
        })
    }
}
