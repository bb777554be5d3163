//! Event-stream reconnection policy
//!
//! ```text
//!            record_open            on_error (attempts < max)
//!   Idle ─────────────────▶ Connected ─────────────────────▶ Retrying(n)
//!                              ▲   │                            │  │
//!        record_established    │   │ on_error (attempts == max) │  │ on_error
//!        ──────────────────────┘   ▼                            │  ▼
//!                               GivenUp ◀───────────────────────┘ (same rules)
//!
//!   stop(): any state ──▶ Stopped      record_open(): GivenUp/Stopped ──▶ Connected
//! ```
//!
//! The attempt counter only grows: it is never reset by a successful
//! reconnect, so the budget covers the whole lifetime of the consumer.

use std::fmt;

use provisioner_core::StreamConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// No connection was ever opened
    Idle,
    Connected,
    /// Reconnect number `n` is in progress
    Retrying(u32),
    /// Budget exhausted; only an explicit open reconnects
    GivenUp,
    /// Stream closed on purpose
    Stopped,
}

impl fmt::Display for ReconnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connected => write!(f, "connected"),
            Self::Retrying(n) => write!(f, "retrying({})", n),
            Self::GivenUp => write!(f, "given up"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// What to do about a connection error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reconnect immediately; this is attempt `n`
    Retry(u32),
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    state: ReconnectState,
    attempts: u32,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: ReconnectState::Idle,
            attempts: 0,
            max_attempts,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.max_reconnect_attempts)
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Reconnects spent so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A connection was opened by a caller or by a retry
    ///
    /// Retries stay `Retrying` until the server accepts the stream.
    pub fn record_open(&mut self) {
        if !matches!(self.state, ReconnectState::Retrying(_)) {
            self.state = ReconnectState::Connected;
        }
    }

    /// The server accepted the stream
    pub fn record_established(&mut self) {
        if matches!(
            self.state,
            ReconnectState::Retrying(_) | ReconnectState::Idle
        ) {
            self.state = ReconnectState::Connected;
        }
    }

    /// The current connection failed
    pub fn on_error(&mut self) -> ReconnectDecision {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            self.state = ReconnectState::Retrying(self.attempts);
            ReconnectDecision::Retry(self.attempts)
        } else {
            self.state = ReconnectState::GivenUp;
            ReconnectDecision::GiveUp
        }
    }

    pub fn stop(&mut self) {
        self.state = ReconnectState::Stopped;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}
