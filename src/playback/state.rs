//! Player state machine and the cross-thread status board.

use std::fmt;

use parking_lot::Mutex;

/// Player lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// Constructed, no configuration yet
    Uninitialized,
    /// Configuration accepted, no source open
    Initialized,
    /// A source is being opened along with its decoders
    Opening,
    /// Streams selected, threads running, not yet presenting
    Ready,
    Playing,
    Paused,
    /// Source exhausted or explicitly closed
    Ended,
    /// Unrecoverable setup failure; see `last_error`
    Broken,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Uninitialized => "uninitialized",
            PlayerState::Initialized => "initialized",
            PlayerState::Opening => "opening",
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Ended => "ended",
            PlayerState::Broken => "broken",
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlayerState::Paused)
    }

    /// A source is open and its threads may be running
    pub fn has_source(&self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Playing | PlayerState::Paused
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State plus last error message; the only signals visible across threads
#[derive(Debug)]
pub struct SharedStatus {
    state: Mutex<PlayerState>,
    last_error: Mutex<Option<String>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlayerState::Uninitialized),
            last_error: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    pub fn set(&self, state: PlayerState) {
        let mut current = self.state.lock();
        let previous = *current;
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "player state");
            *current = state;
        }
    }

    /// Move to `to` only if currently in `from`
    pub fn transition(&self, from: PlayerState, to: PlayerState) -> bool {
        let mut current = self.state.lock();
        if *current != from {
            return false;
        }
        tracing::debug!(from = %from, to = %to, "player state");
        *current = to;
        true
    }

    pub fn record_error(&self, error: impl fmt::Display) {
        *self.last_error.lock() = Some(error.to_string());
    }

    /// Record the error and move to `Broken`
    pub fn mark_broken(&self, error: impl fmt::Display) {
        let message = error.to_string();
        tracing::error!("{}", message);
        self.record_error(message);
        self.set(PlayerState::Broken);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}
