//! Mock collaborators for testing
//!
//! In-memory transport and push connector so consumer and gateway behavior
//! can be tested without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use provisioner_client::{
    ConnectionId, ConnectionState, PushConnection, PushConnector, RequestResult,
    SharedConnectionState, StreamSignal, Transport, TransportError, TransportRequest,
};

// ============================================================================
// MockTransport
// ============================================================================

/// Replays queued outcomes, then answers `200 null`; records every request
#[derive(Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<RequestResult, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, status: u16, body: Value) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(RequestResult::new(body, status)));
        self
    }

    pub fn with_error(self, error: TransportError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, request: TransportRequest) -> Result<RequestResult, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RequestResult::new(Value::Null, 200)))
    }
}

// ============================================================================
// MockPushConnector
// ============================================================================

struct ConnectionRecord {
    id: ConnectionId,
    url: String,
    state: SharedConnectionState,
    closes: Arc<AtomicUsize>,
}

/// Push connector whose connections only change when the test says so
///
/// Clones share their records, so a test can keep one clone while the
/// consumer owns another.
#[derive(Clone, Default)]
pub struct MockPushConnector {
    records: Arc<Mutex<Vec<ConnectionRecord>>>,
    next_id: Arc<AtomicU64>,
}

impl MockPushConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections opened so far
    pub fn connection_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Connections currently in the `Open` state
    pub fn open_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.state.get() == ConnectionState::Open)
            .count()
    }

    pub fn id(&self, index: usize) -> ConnectionId {
        self.records.lock().unwrap()[index].id
    }

    pub fn url(&self, index: usize) -> String {
        self.records.lock().unwrap()[index].url.clone()
    }

    pub fn state(&self, index: usize) -> ConnectionState {
        self.records.lock().unwrap()[index].state.get()
    }

    /// Times `close()` was called on connection `index`
    pub fn close_calls(&self, index: usize) -> usize {
        self.records.lock().unwrap()[index]
            .closes
            .load(Ordering::SeqCst)
    }

    /// Latest connection, if any
    pub fn last_id(&self) -> Option<ConnectionId> {
        self.records.lock().unwrap().last().map(|r| r.id)
    }

    /// Fail connection `index` the way a real connection does: it moves to
    /// `Closing` and reports one error
    pub fn fail(&self, index: usize, reason: &str) -> StreamSignal {
        let records = self.records.lock().unwrap();
        let record = &records[index];
        record.state.set(ConnectionState::Closing);
        StreamSignal::error(record.id, reason)
    }

    /// Fail the latest connection
    pub fn fail_last(&self, reason: &str) -> StreamSignal {
        self.fail(self.connection_count() - 1, reason)
    }
}

struct MockConnection {
    id: ConnectionId,
    state: SharedConnectionState,
    closes: Arc<AtomicUsize>,
}

impl PushConnection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.state.set(ConnectionState::Closed);
    }
}

impl PushConnector for MockPushConnector {
    fn connect(&self, url: &str) -> Box<dyn PushConnection> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let state = SharedConnectionState::new(ConnectionState::Open);
        let closes = Arc::new(AtomicUsize::new(0));
        self.records.lock().unwrap().push(ConnectionRecord {
            id,
            url: url.to_string(),
            state: state.clone(),
            closes: closes.clone(),
        });
        Box::new(MockConnection { id, state, closes })
    }
}
