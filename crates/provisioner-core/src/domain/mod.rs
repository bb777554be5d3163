//! Domain entities and events
//!
//! - Entities (Cluster, InstallPrompt)
//! - Domain Events (DomainEvent enum dispatched on the event bus)

mod cluster;
mod event;
mod prompt;

pub use cluster::*;
pub use event::{DomainEvent, DomainEventEnvelope};
pub use prompt::*;
