//! # Provisioner Core Library
//!
//! Domain types and plumbing shared by the provisioner client.
//!
//! ## Modules
//!
//! - `domain` - Core entities (Cluster, InstallPrompt) and the DomainEvent enum
//! - `wire` - Decoding of installer event-stream messages into domain events
//! - `event_bus` - Central event distribution system
//! - `config` - Endpoint templates and stream settings

pub mod config;
pub mod domain;
pub mod event_bus;
pub mod wire;

// Re-export commonly used types
pub use domain::*;

pub use config::{fill_template, ConfigError, Endpoints, StreamConfig};
pub use event_bus::{EventBus, EventReceiver, EventSender, DEFAULT_CAPACITY};
pub use wire::{decode_message, DecodeError, WireEnvelope};
