//! Server-Sent Events push connections
//!
//! Each connection is a streaming GET read by its own task. The task reports
//! `Opened`, every `message` event, and finally one `Error` when the stream
//! fails or ends. Closing the handle cancels the task without further
//! signals.

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{
    ConnectionId, ConnectionState, PushConnection, PushConnector, SharedConnectionState,
    SignalSender, StreamSignal,
};

/// Default SSE event type
const MESSAGE_EVENT: &str = "message";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest line kept in memory; longer lines are dropped whole
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`event:` field), "message" when absent
    pub event_type: String,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Last `id:` seen on the stream
    pub id: Option<String>,
}

/// Incremental SSE frame parser
///
/// Bytes may be split anywhere, including inside a line, a `\r\n` pair or
/// a UTF-8 sequence; complete lines are only interpreted once their
/// terminator arrives. Lines end in `\n`, `\r\n` or a bare `\r`, and a
/// leading byte order mark is skipped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    bom_checked: bool,
    /// Previous chunk ended in `\r`; a leading `\n` belongs to it
    skip_lf: bool,
    /// Dropping the rest of an overlong line
    discarding: bool,
    event_type: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        if !self.bom_checked {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return events;
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut start = 0;
        loop {
            if self.skip_lf && start < self.buffer.len() {
                if self.buffer[start] == b'\n' {
                    start += 1;
                }
                self.skip_lf = false;
            }
            let Some(offset) = self.buffer[start..]
                .iter()
                .position(|&b| b == b'\n' || b == b'\r')
            else {
                break;
            };
            let end = start + offset;
            let next = match self.buffer[end] {
                b'\r' if self.buffer.get(end + 1) == Some(&b'\n') => end + 2,
                b'\r' => {
                    self.skip_lf = end + 1 == self.buffer.len();
                    end + 1
                }
                _ => end + 1,
            };

            if self.discarding {
                self.discarding = false;
            } else {
                let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
                if let Some(event) = self.process_line(&line) {
                    events.push(event);
                }
            }
            start = next;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_LINE_BYTES {
            warn!(
                buffered = self.buffer.len(),
                "[SSE] Line exceeds {} bytes, dropping it", MAX_LINE_BYTES
            );
            self.buffer.clear();
            self.discarding = true;
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event_type = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => trace!(field, "[SSE] Ignoring field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = self.event_type.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event_type: event_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| MESSAGE_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

/// Opens SSE connections with a shared reqwest client
pub struct SseConnector {
    client: reqwest::Client,
    signals: SignalSender,
    next_id: AtomicU64,
}

impl SseConnector {
    /// The client should not set a request timeout: it would cut long-lived
    /// streams.
    pub fn new(client: reqwest::Client, signals: SignalSender) -> Self {
        Self {
            client,
            signals,
            next_id: AtomicU64::new(1),
        }
    }
}

impl PushConnector for SseConnector {
    fn connect(&self, url: &str) -> Box<dyn PushConnection> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let state = SharedConnectionState::new(ConnectionState::Open);
        let cancel = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(connection = %id, url, "[SSE] Connecting");
                runtime.spawn(read_stream(
                    self.client.clone(),
                    url.to_string(),
                    id,
                    state.clone(),
                    cancel.clone(),
                    self.signals.clone(),
                ));
            }
            Err(e) => {
                state.set(ConnectionState::Closing);
                let _ = self
                    .signals
                    .send(StreamSignal::error(id, format!("no async runtime: {}", e)));
            }
        }

        Box::new(SseConnection { id, state, cancel })
    }
}

struct SseConnection {
    id: ConnectionId,
    state: SharedConnectionState,
    cancel: CancellationToken,
}

impl PushConnection for SseConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn close(&mut self) {
        self.state.set(ConnectionState::Closed);
        self.cancel.cancel();
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_stream(
    client: reqwest::Client,
    url: String,
    id: ConnectionId,
    state: SharedConnectionState,
    cancel: CancellationToken,
    signals: SignalSender,
) {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(connection = %id, "[SSE] Reader cancelled");
            return;
        }
        outcome = pump(&client, &url, id, &signals) => outcome,
    };

    // close() may have raced the failure; a closed connection stays silent
    if !state.transition(ConnectionState::Open, ConnectionState::Closing) {
        return;
    }
    let reason = match outcome {
        Ok(()) => "stream ended".to_string(),
        Err(reason) => reason,
    };
    let _ = signals.send(StreamSignal::error(id, reason));
}

async fn pump(
    client: &reqwest::Client,
    url: &str,
    id: ConnectionId,
    signals: &SignalSender,
) -> Result<(), String> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| format!("failed to connect: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("unexpected status {}", status));
    }

    info!(connection = %id, url, "[SSE] Stream open");
    if signals.send(StreamSignal::opened(id)).is_err() {
        return Ok(());
    }

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| format!("stream error: {}", e))?;
        for event in parser.feed(&chunk) {
            if event.event_type != MESSAGE_EVENT {
                trace!(connection = %id, event_type = %event.event_type, "[SSE] Skipping named event");
                continue;
            }
            if signals.send(StreamSignal::message(id, event.data)).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}
