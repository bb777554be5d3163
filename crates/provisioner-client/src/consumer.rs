//! Event Stream Consumer
//!
//! Owns the single push connection to the installer's event stream, decodes
//! every message into domain events and emits them on the bus in arrival
//! order. Connection errors go through the [`ReconnectPolicy`].
//!
//! Signals are processed one at a time, either by calling
//! [`EventStreamConsumer::handle_signal`] directly or through the
//! [`EventStreamConsumer::run`] driver.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use provisioner_core::{decode_message, ClusterFactory, EventSender, StreamConfig};

use crate::push::{
    ConnectionState, PushConnection, PushConnector, SignalKind, SignalReceiver, StreamSignal,
};
use crate::reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};

pub struct EventStreamConsumer {
    events_url: Option<String>,
    connector: Box<dyn PushConnector>,
    connection: Option<Box<dyn PushConnection>>,
    policy: ReconnectPolicy,
    events: EventSender,
    clusters: Arc<dyn ClusterFactory>,
}

impl EventStreamConsumer {
    pub fn new(
        events_url: Option<String>,
        connector: Box<dyn PushConnector>,
        events: EventSender,
        clusters: Arc<dyn ClusterFactory>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            events_url,
            connector,
            connection: None,
            policy: ReconnectPolicy::from_config(config),
            events,
            clusters,
        }
    }

    /// Open the event stream unless a connection is already live
    ///
    /// Returns `false` without connecting when the current connection is not
    /// closed, or when no events endpoint is configured.
    pub fn open_event_stream(&mut self) -> bool {
        if let Some(connection) = &self.connection {
            if connection.state() != ConnectionState::Closed {
                debug!(
                    connection = %connection.id(),
                    state = %connection.state(),
                    "[EventStream] Stream already open"
                );
                return false;
            }
        }

        let Some(url) = self.events_url.as_deref().filter(|url| !url.is_empty()) else {
            error!("[EventStream] Can't open event stream without URL");
            return false;
        };

        let connection = self.connector.connect(url);
        info!(connection = %connection.id(), url, "[EventStream] Opening event stream");
        self.connection = Some(connection);
        self.policy.record_open();
        true
    }

    /// Close the current connection; a no-op when nothing is open
    pub fn close_event_stream(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        if connection.state() == ConnectionState::Closed {
            return;
        }
        connection.close();
        self.policy.stop();
        info!(connection = %connection.id(), "[EventStream] Event stream closed");
    }

    /// Whether the current connection is open
    pub fn is_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.state() == ConnectionState::Open)
    }

    pub fn reconnect_state(&self) -> ReconnectState {
        self.policy.state()
    }

    /// Reconnects spent over the consumer's lifetime
    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempts()
    }

    /// React to one connection signal
    ///
    /// Signals of connections other than the current one are stale and
    /// ignored, as is anything arriving after the stream was closed.
    pub fn handle_signal(&mut self, signal: StreamSignal) {
        let Some(connection) = self.connection.as_ref() else {
            trace!(connection = %signal.connection, "[EventStream] No stream, dropping signal");
            return;
        };
        if connection.id() != signal.connection {
            trace!(
                connection = %signal.connection,
                current = %connection.id(),
                "[EventStream] Dropping signal of stale connection"
            );
            return;
        }
        if connection.state() == ConnectionState::Closed {
            return;
        }

        match signal.kind {
            SignalKind::Opened => {
                self.policy.record_established();
                debug!(connection = %signal.connection, "[EventStream] Stream established");
            }
            SignalKind::Message(data) => self.dispatch(&data),
            SignalKind::Error(reason) => self.handle_error(&reason),
        }
    }

    fn dispatch(&self, data: &str) {
        let events = match decode_message(data, self.clusters.as_ref()) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "[EventStream] Dropping undecodable message");
                return;
            }
        };
        for event in events {
            trace!(event_type = event.type_name(), "[EventStream] Dispatching");
            self.events.emit(event);
        }
    }

    fn handle_error(&mut self, reason: &str) {
        if let Some(mut connection) = self.connection.take() {
            warn!(connection = %connection.id(), reason, "[EventStream] Connection error");
            connection.close();
        }

        match self.policy.on_error() {
            ReconnectDecision::Retry(attempt) => {
                info!(
                    attempt,
                    max_attempts = self.policy.max_attempts(),
                    "[EventStream] Reconnecting"
                );
                self.open_event_stream();
            }
            ReconnectDecision::GiveUp => {
                error!(
                    attempts = self.policy.attempts(),
                    "[EventStream] Reconnect attempts exhausted, giving up"
                );
            }
        }
    }

    /// Open the stream and process `signals` until `shutdown` fires or the
    /// reconnect policy gives up
    ///
    /// Returns the final reconnect state: `Stopped` after shutdown, `GivenUp`
    /// when retries ran out.
    pub async fn run(
        &mut self,
        mut signals: SignalReceiver,
        shutdown: CancellationToken,
    ) -> ReconnectState {
        self.open_event_stream();
        if self.connection.is_none() {
            return self.policy.state();
        }

        loop {
            if self.policy.state() == ReconnectState::GivenUp {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.close_event_stream();
                    break;
                }
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => {
                        warn!("[EventStream] Signal channel closed");
                        self.close_event_stream();
                        break;
                    }
                },
            }
        }

        info!(state = %self.policy.state(), "[EventStream] Consumer stopped");
        self.policy.state()
    }
}

impl Drop for EventStreamConsumer {
    fn drop(&mut self) {
        self.close_event_stream();
    }
}
