//! Request gateway integration tests
//!
//! Each action runs through `ReqwestTransport` against a wiremock server, or
//! through `MockTransport` where only request shaping matters.

mod clusters;

use std::sync::Arc;

use tests::{Endpoints, EventBus, EventReceiver, RequestGateway, ReqwestTransport};
use wiremock::MockServer;

/// Gateway with the standard endpoints under `server`
pub fn gateway_for(server: &MockServer) -> (RequestGateway, EventReceiver) {
    let bus = EventBus::new();
    let rx = bus.subscribe();
    let gateway = RequestGateway::new(
        Arc::new(ReqwestTransport::new().unwrap()),
        Endpoints::from_base_url(&server.uri()),
        bus.sender(),
    );
    (gateway, rx)
}
