//! Audio routing mode
//!
//! Mobile platforms need the audio session switched between a
//! record-enabled and a playback route; recording with the playback route
//! active (or the reverse) produces silence or device conflicts.

use std::sync::{Mutex, PoisonError};

/// Active audio route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Microphone enabled, ready to record
    Recording,
    /// Speaker route, microphone disabled
    Playback,
}

/// Switches the platform audio route
pub trait AudioRouting: Send + Sync {
    /// Switch to a mode
    fn set_mode(&self, mode: AudioMode);

    /// Current mode
    fn mode(&self) -> AudioMode;
}

/// In-process route tracker
///
/// Desktop hosts have no session route to flip, so this only records the
/// requested mode and logs transitions.
#[derive(Debug)]
pub struct ModeSwitch {
    mode: Mutex<AudioMode>,
}

impl ModeSwitch {
    /// Create a switch in recording-ready mode
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mutex::new(AudioMode::Recording),
        }
    }
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioRouting for ModeSwitch {
    fn set_mode(&self, mode: AudioMode) {
        let mut current = self.mode.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != mode {
            tracing::trace!(from = ?*current, to = ?mode, "audio route switched");
            *current = mode;
        }
    }

    fn mode(&self) -> AudioMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
