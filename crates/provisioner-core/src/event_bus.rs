//! Event bus for domain events
//!
//! One broadcast channel carries every `DomainEvent`. The stream consumer,
//! the request gateway and the cert verifier publish into it; the CLI
//! printer and the cert verifier read from it.
//!
//! `emit` is synchronous and never waits for readers, so each subscriber
//! sees events in the order producers emitted them. A subscriber that
//! falls more than `capacity` events behind loses the oldest ones. The
//! receiver logs the gap, adds it to `skipped()` and resumes with the
//! oldest event still buffered. Readers that do slow work per event should
//! hand it off to a task instead of holding up `recv`.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::DomainEvent;

/// Events buffered per subscriber before the oldest are overwritten
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Events emitted before this call are not delivered to the new receiver.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
            skipped: 0,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer handle
#[derive(Clone)]
pub struct EventSender {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventSender {
    /// Publish `event` and return how many subscribers it was queued for.
    ///
    /// Nobody listening is not an error; the event is just dropped.
    pub fn emit(&self, event: DomainEvent) -> usize {
        let kind = event.type_name();
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(event_type = kind, receivers = delivered, "[EventBus] Emitted");
        delivered
    }
}

/// Subscriber handle
pub struct EventReceiver {
    rx: broadcast::Receiver<DomainEvent>,
    skipped: u64,
}

impl EventReceiver {
    /// Next event, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every event currently queued, oldest first.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Total events this receiver lost by falling behind.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn record_lag(&mut self, n: u64) {
        self.skipped += n;
        warn!(
            skipped = n,
            total_skipped = self.skipped,
            "[EventBus] Subscriber fell behind, oldest events dropped"
        );
    }
}
