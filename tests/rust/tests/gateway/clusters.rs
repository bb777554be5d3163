//! Cluster lifecycle and installer interaction

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_bytes, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use provisioner_client::{PromptResponse, RequestBody, UploadFile};
use tests::events::names;
use tests::{DomainEvent, Endpoints, EventBus, MockTransport, RequestGateway};

use super::gateway_for;

#[tokio::test]
async fn test_launch_cluster_without_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters"))
        .and(body_json(json!({"type": "aws", "name": "staging", "has_backup": false})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c42"})))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, mut rx) = gateway_for(&server);
    gateway
        .launch_cluster(json!({"type": "aws", "name": "staging"}), None)
        .await
        .unwrap();

    assert_eq!(
        rx.drain(),
        vec![DomainEvent::ClusterLaunched {
            cluster_id: "c42".to_string(),
            res: json!({"id": "c42"}),
            status: 201,
        }]
    );
}

#[tokio::test]
async fn test_launch_cluster_uploads_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters"))
        .and(body_json(json!({"name": "restored", "has_backup": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/clusters/7/upload-backup"))
        .and(header("content-length", "11"))
        .and(header("content-type", "application/gzip"))
        .and(body_bytes(b"backup-data".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, mut rx) = gateway_for(&server);
    gateway
        .launch_cluster(
            json!({"name": "restored"}),
            Some(UploadFile::new(&b"backup-data"[..], "application/gzip")),
        )
        .await
        .unwrap();

    assert_eq!(names(&rx.drain()), vec!["LAUNCH_CLUSTER_SUCCESS"]);
}

#[tokio::test]
async fn test_failed_backup_upload_keeps_launch_successful() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/clusters/c1/upload-backup"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, mut rx) = gateway_for(&server);
    let result = gateway
        .launch_cluster(json!({}), Some(UploadFile::new(&b"x"[..], "application/gzip")))
        .await;

    assert!(result.is_ok());
    assert_eq!(names(&rx.drain()), vec!["LAUNCH_CLUSTER_SUCCESS"]);
}

#[tokio::test]
async fn test_launch_failure_reports_new_cluster() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad region"})))
        .mount(&server)
        .await;

    let (gateway, mut rx) = gateway_for(&server);
    let result = gateway
        .launch_cluster(json!({}), Some(UploadFile::new(&b"x"[..], "application/gzip")))
        .await;

    assert!(result.is_err());
    assert_eq!(
        rx.drain(),
        vec![DomainEvent::ClusterLaunchFailed {
            cluster_id: "new".to_string(),
            res: json!({"error": "bad region"}),
            status: 400,
        }]
    );
    // no upload after a failed launch
    let uploads = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("upload-backup"))
        .count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn test_delete_cluster() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/clusters/c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/clusters/c2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, mut rx) = gateway_for(&server);
    assert!(gateway.delete_cluster("c1").await.is_ok());
    assert!(gateway.delete_cluster("c2").await.is_err());

    assert_eq!(
        rx.drain(),
        vec![
            DomainEvent::ClusterDeleteSucceeded {
                cluster_id: "c1".to_string(),
            },
            DomainEvent::ClusterDeleteFailed {
                cluster_id: "c2".to_string(),
                err: json!({"error": "not found"}),
                status: 404,
            },
        ]
    );
}

#[tokio::test]
async fn test_prompt_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters/c1/prompts/p1"))
        .and(body_json(json!({"value": "b"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, mut rx) = gateway_for(&server);
    gateway
        .send_prompt_response("c1", "p1", PromptResponse::Json(json!({"value": "b"})))
        .await;

    assert!(rx.try_recv().is_none());
}

#[tokio::test]
async fn test_prompt_file_response_is_raw() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/clusters/c1/prompts/kubeconfig"))
        .and(header("content-length", "9"))
        .and(body_bytes(b"apiVersio".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, _rx) = gateway_for(&server);
    gateway
        .send_prompt_response(
            "c1",
            "kubeconfig",
            PromptResponse::File(UploadFile::new(&b"apiVersio"[..], "text/yaml")),
        )
        .await;
}

#[tokio::test]
async fn test_prompt_failure_is_only_logged() {
    let transport = Arc::new(MockTransport::new().with_response(500, json!({"error": "gone"})));
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let gateway = RequestGateway::new(
        transport.clone(),
        Endpoints::from_base_url("http://installer"),
        bus.sender(),
    );

    gateway
        .send_prompt_response("c1", "p1", PromptResponse::Json(json!("yes")))
        .await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, Some(RequestBody::Json(json!("yes"))));
    assert!(rx.try_recv().is_none());
}
