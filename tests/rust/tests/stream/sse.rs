//! SSE connector tests against a wiremock server
//!
//! wiremock answers with a complete body, so every connection delivers its
//! messages and then ends, which the consumer treats as a connection error.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use provisioner_client::{signal_channel, SignalReceiver, SseConnector};
use provisioner_core::TypedClusterFactory;
use tests::events::names;
use tests::{
    init_test_tracing, wire, EventBus, EventStreamConsumer, ReconnectState, ReqwestTransport,
    StreamConfig,
};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn sse_consumer(
    events_url: String,
    max_reconnect_attempts: u32,
) -> (EventStreamConsumer, SignalReceiver, EventBus) {
    let transport = ReqwestTransport::new().unwrap();
    let (signal_tx, signals) = signal_channel();
    let bus = EventBus::new();
    let consumer = EventStreamConsumer::new(
        Some(events_url),
        Box::new(SseConnector::new(transport.client().clone(), signal_tx)),
        bus.sender(),
        Arc::new(TypedClusterFactory),
        &StreamConfig {
            max_reconnect_attempts,
        },
    );
    (consumer, signals, bus)
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

#[tokio::test]
async fn test_ended_streams_reconnect_until_budget_is_spent() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse_response(wire::sse_body(&[
            wire::cluster_state("c1", "installing"),
            wire::cluster_state("c1", "running"),
        ])))
        .expect(4)
        .mount(&server)
        .await;

    let (mut consumer, signals, bus) = sse_consumer(format!("{}/events", server.uri()), 3);
    let mut rx = bus.subscribe();

    let state = tokio::time::timeout(RUN_TIMEOUT, consumer.run(signals, CancellationToken::new()))
        .await
        .expect("consumer should give up");

    assert_eq!(state, ReconnectState::GivenUp);
    assert_eq!(consumer.reconnect_attempts(), 3);
    assert!(!consumer.is_open());

    let events = rx.drain();
    assert_eq!(events.len(), 8);
    assert!(names(&events).iter().all(|name| *name == "CLUSTER_STATE"));
    assert_eq!(
        events
            .iter()
            .filter_map(|e| match e {
                tests::DomainEvent::ClusterState { state, .. } => state.as_deref(),
                _ => None,
            })
            .take(2)
            .collect::<Vec<_>>(),
        vec!["installing", "running"]
    );
}

#[tokio::test]
async fn test_error_status_counts_as_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let (mut consumer, signals, bus) = sse_consumer(format!("{}/events", server.uri()), 3);
    let mut rx = bus.subscribe();

    let state = tokio::time::timeout(RUN_TIMEOUT, consumer.run(signals, CancellationToken::new()))
        .await
        .expect("consumer should give up");

    assert_eq!(state, ReconnectState::GivenUp);
    assert!(rx.try_recv().is_none());
}

#[tokio::test]
async fn test_only_default_events_are_dispatched() {
    let server = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\nevent: ping\ndata: {{}}\n\nid: 42\r\ndata: {}\r\n\r\n",
        wire::cluster_state("c7", "running")
    );
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let (mut consumer, signals, bus) = sse_consumer(format!("{}/events", server.uri()), 0);
    let mut rx = bus.subscribe();

    let state = tokio::time::timeout(RUN_TIMEOUT, consumer.run(signals, CancellationToken::new()))
        .await
        .expect("consumer should give up");

    assert_eq!(state, ReconnectState::GivenUp);
    let events = rx.drain();
    assert_eq!(names(&events), vec!["CLUSTER_STATE"]);
    assert_eq!(events[0].cluster_id(), Some("c7"));
}

#[tokio::test]
async fn test_shutdown_closes_pending_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(
            sse_response(wire::sse_body(&[wire::cluster_state("c1", "late")]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (mut consumer, signals, bus) = sse_consumer(format!("{}/events", server.uri()), 3);
    let mut rx = bus.subscribe();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let state = tokio::time::timeout(RUN_TIMEOUT, consumer.run(signals, shutdown))
        .await
        .expect("consumer should stop on shutdown");

    assert_eq!(state, ReconnectState::Stopped);
    assert_eq!(consumer.reconnect_attempts(), 0);
    assert!(rx.try_recv().is_none());
}
