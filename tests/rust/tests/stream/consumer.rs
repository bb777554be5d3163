//! EventStreamConsumer tests with mock push connections

use pretty_assertions::assert_eq;
use serde_json::json;
use tests::events::names;
use tests::wire;
use tests::{ConsumerHarness, DomainEvent, ReconnectState, StreamConfig, StreamSignal};

const EVENTS_URL: &str = "http://installer/events";

// =============================================================================
// Connection guard
// =============================================================================

#[test]
fn test_second_open_is_noop() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));

    assert!(h.consumer.open_event_stream());
    assert!(!h.consumer.open_event_stream());

    assert_eq!(h.connector.connection_count(), 1);
    assert_eq!(h.connector.url(0), EVENTS_URL);
    assert!(h.rx.try_recv().is_none());
}

#[test]
fn test_open_after_close_reconnects() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();
    h.consumer.close_event_stream();
    h.consumer.close_event_stream();
    assert_eq!(h.connector.close_calls(0), 1);

    assert!(h.consumer.open_event_stream());
    assert_eq!(h.connector.connection_count(), 2);
    assert_eq!(h.connector.open_count(), 1);
}

#[test]
fn test_close_with_error_still_queued() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();
    let queued = h.connector.fail_last("connection reset");

    h.consumer.close_event_stream();
    h.consumer.close_event_stream();
    h.consumer.handle_signal(queued);

    assert_eq!(h.connector.close_calls(0), 1);
    assert_eq!(h.connector.connection_count(), 1);
    assert_eq!(h.consumer.reconnect_state(), ReconnectState::Stopped);
    assert_eq!(h.consumer.reconnect_attempts(), 0);
}

#[test]
fn test_missing_events_url() {
    let mut h = ConsumerHarness::new(None);
    assert!(!h.consumer.open_event_stream());
    assert_eq!(h.connector.connection_count(), 0);
}

// =============================================================================
// Decoding and dispatch
// =============================================================================

#[test]
fn test_unknown_type_dispatches_raw_payload() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    let raw = json!({"type": "quota_warning", "cluster_id": "c1", "percent": 93});
    h.deliver(raw.to_string());

    assert_eq!(
        h.rx.drain(),
        vec![DomainEvent::UnknownEvent {
            cluster_id: Some("c1".to_string()),
            data: raw,
        }]
    );
}

#[test]
fn test_choice_prompt_is_decoded_twice() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    h.deliver(wire::choice_prompt("c1", "p1", "pick one", &["a", "b"]));

    match h.rx.try_recv() {
        Some(DomainEvent::InstallPromptRequested { cluster_id, prompt }) => {
            assert_eq!(cluster_id.as_deref(), Some("c1"));
            assert_eq!(prompt.id, "p1");
            assert_eq!(prompt.message, "pick one");
            assert_eq!(prompt.options, Some(vec!["a".to_string(), "b".to_string()]));
        }
        other => panic!("Expected InstallPromptRequested, got {:?}", other),
    }
}

#[test]
fn test_install_done_emits_check_cert_second() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    h.deliver(wire::install_done("c1", "example.com"));

    let events = h.rx.drain();
    assert_eq!(names(&events), vec!["INSTALL_DONE", "CHECK_CERT"]);
    assert_eq!(events[0].cluster_id(), Some("c1"));
    assert_eq!(
        events[1],
        DomainEvent::CheckCertRequested {
            cluster_id: Some("c1".to_string()),
            domain_name: "example.com".to_string(),
        }
    );
}

#[test]
fn test_bad_messages_do_not_break_the_stream() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    h.deliver("{truncated".to_string());
    h.deliver(wire::message(json!({"type": "progress", "description": "not json"})));
    h.deliver(wire::cluster_state("c1", "installing"));

    assert_eq!(names(&h.rx.drain()), vec!["CLUSTER_STATE"]);
    assert!(h.consumer.is_open());
    assert_eq!(h.connector.connection_count(), 1);
}

#[test]
fn test_events_follow_message_order() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    h.deliver(wire::cluster_state("c1", "installing"));
    h.deliver(wire::message(json!({"type": "log", "cluster_id": "c1", "line": "step 1"})));
    h.deliver(wire::message(
        json!({"type": "progress", "cluster_id": "c1", "description": "{\"step\":2,\"total\":5}"}),
    ));
    h.deliver(wire::message(json!({"type": "error", "cluster_id": "c1", "description": "disk full"})));

    let events = h.rx.drain();
    assert_eq!(
        names(&events),
        vec!["CLUSTER_STATE", "LOG", "PROGRESS", "INSTALL_ERROR"]
    );
    assert_eq!(
        events[2],
        DomainEvent::Progress {
            cluster_id: Some("c1".to_string()),
            data: json!({"step": 2, "total": 5}),
        }
    );
}

// =============================================================================
// Reconnection
// =============================================================================

#[test]
fn test_errors_reconnect_three_times_then_give_up() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    for attempt in 1..=3 {
        h.fail_current();
        assert_eq!(h.connector.connection_count(), attempt + 1);
        assert_eq!(h.connector.open_count(), 1);
        assert_eq!(
            h.consumer.reconnect_state(),
            ReconnectState::Retrying(attempt as u32)
        );
    }

    h.fail_current();
    assert_eq!(h.connector.connection_count(), 4);
    assert_eq!(h.connector.open_count(), 0);
    assert_eq!(h.consumer.reconnect_state(), ReconnectState::GivenUp);
    assert!(h.rx.try_recv().is_none());
}

#[test]
fn test_successful_reconnect_does_not_refill_budget() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();

    for _ in 0..3 {
        h.fail_current();
        let id = h.connector.last_id().unwrap();
        h.consumer.handle_signal(StreamSignal::opened(id));
        assert_eq!(h.consumer.reconnect_state(), ReconnectState::Connected);
        h.deliver(wire::cluster_state("c1", "running"));
    }

    h.fail_current();
    assert_eq!(h.consumer.reconnect_state(), ReconnectState::GivenUp);
    assert_eq!(h.connector.connection_count(), 4);
    assert_eq!(h.rx.drain().len(), 3);
}

#[test]
fn test_external_open_after_give_up() {
    let mut h = ConsumerHarness::with_config(
        Some(EVENTS_URL),
        StreamConfig {
            max_reconnect_attempts: 1,
        },
    );
    h.consumer.open_event_stream();
    h.fail_current();
    h.fail_current();
    assert_eq!(h.consumer.reconnect_state(), ReconnectState::GivenUp);

    assert!(h.consumer.open_event_stream());
    assert_eq!(h.connector.connection_count(), 3);

    // the counter was never reset, so the next error gives up immediately
    h.fail_current();
    assert_eq!(h.connector.connection_count(), 3);
    assert_eq!(h.consumer.reconnect_attempts(), 1);
}

#[test]
fn test_stale_connection_signals_are_ignored() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();
    let first = h.connector.id(0);
    h.fail_current();

    h.consumer
        .handle_signal(StreamSignal::message(first, wire::cluster_state("c1", "old")));
    h.consumer
        .handle_signal(StreamSignal::error(first, "late error"));

    assert!(h.rx.try_recv().is_none());
    assert_eq!(h.connector.connection_count(), 2);
    assert_eq!(h.consumer.reconnect_attempts(), 1);
}

#[test]
fn test_close_suppresses_dispatch() {
    let mut h = ConsumerHarness::new(Some(EVENTS_URL));
    h.consumer.open_event_stream();
    let id = h.connector.id(0);
    h.consumer.close_event_stream();

    h.consumer
        .handle_signal(StreamSignal::message(id, wire::cluster_state("c1", "running")));
    h.consumer.handle_signal(StreamSignal::error(id, "closed"));

    assert!(h.rx.try_recv().is_none());
    assert_eq!(h.connector.connection_count(), 1);
    assert_eq!(h.consumer.reconnect_state(), ReconnectState::Stopped);
}
