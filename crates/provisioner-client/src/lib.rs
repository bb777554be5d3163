//! Provisioner Client
//!
//! Client-side integration with the cluster provisioning service:
//! - Typed provisioning actions over an abstract HTTP transport (`RequestGateway`)
//! - Live installer event stream over Server-Sent Events (`EventStreamConsumer`)
//! - Bounded reconnection of the event stream (`ReconnectPolicy`)
//! - Dashboard certificate checks after installs (`CertVerifier`)
//!
//! Everything reports to the `provisioner_core` event bus.

pub mod cert_verifier;
pub mod consumer;
pub mod gateway;
pub mod push;
pub mod reconnect;
pub mod transport;

pub use cert_verifier::CertVerifier;
pub use consumer::EventStreamConsumer;
pub use gateway::{GatewayError, PromptResponse, RequestGateway, UploadFile};
pub use push::{
    signal_channel, ConnectionId, ConnectionState, PushConnection, PushConnector,
    SharedConnectionState, SignalKind, SignalReceiver, SignalSender, SseConnector, StreamSignal,
};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
pub use transport::{
    RequestBody, RequestResult, ReqwestTransport, Transport, TransportError, TransportRequest,
};
