//! Push connections
//!
//! A push connection is a server-to-client stream of discrete messages.
//! Connections report what happens to them through [`StreamSignal`]s sent on
//! a channel shared by every connection of a connector; the signal carries the
//! [`ConnectionId`] so the consumer can tell current connections from stale
//! ones.

mod sse;

pub use sse::{SseConnector, SseEvent, SseParser};

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifies one connection of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Readiness of a push connection
///
/// Only `Open` connections produce messages. `Closing` means the connection
/// failed and reported it but nobody closed it yet; `Closed` connections are
/// silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closing => 1,
            Self::Closed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Connection state shared between a handle and its reader task
#[derive(Debug, Clone)]
pub struct SharedConnectionState(Arc<AtomicU8>);

impl SharedConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(Arc::new(AtomicU8::new(state.to_u8())))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Move to `to` only if the state is still `from`
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// What a connection reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// The server accepted the stream
    Opened,
    /// One message payload
    Message(String),
    /// The connection failed or ended; no more signals follow
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSignal {
    pub connection: ConnectionId,
    pub kind: SignalKind,
}

impl StreamSignal {
    pub fn opened(connection: ConnectionId) -> Self {
        Self {
            connection,
            kind: SignalKind::Opened,
        }
    }

    pub fn message(connection: ConnectionId, data: impl Into<String>) -> Self {
        Self {
            connection,
            kind: SignalKind::Message(data.into()),
        }
    }

    pub fn error(connection: ConnectionId, reason: impl Into<String>) -> Self {
        Self {
            connection,
            kind: SignalKind::Error(reason.into()),
        }
    }
}

pub type SignalSender = mpsc::UnboundedSender<StreamSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<StreamSignal>;

/// Channel every connection of a connector reports on
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}

/// Handle to one live push connection
pub trait PushConnection: Send {
    fn id(&self) -> ConnectionId;

    fn state(&self) -> ConnectionState;

    /// Stop the connection; no signals are delivered afterwards
    fn close(&mut self);
}

/// Opens push connections
pub trait PushConnector: Send {
    /// Start connecting to `url`; the handle is `Open` right away and the
    /// outcome arrives as signals
    fn connect(&self, url: &str) -> Box<dyn PushConnection>;
}
