//! HTTP surface tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use deploybot::app::options::AppOptions;
use deploybot::app::state::AppState;
use deploybot::server::serve::router;
use deploybot::server::state::ServerState;

use crate::common::{memory_platform, RecordingNotifier, RecordingSink};

fn app() -> axum::Router {
    let (state, _receiver) = AppState::assemble(
        &AppOptions::default(),
        Arc::new(deploybot::storage::commands::MemoryCommandStore::new()),
        Arc::new(memory_platform()),
        Arc::new(RecordingNotifier::default()),
        Arc::new(RecordingSink::default()),
    );
    router(Arc::new(ServerState::new(state.store, state.router)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn command_request(text: &str) -> Request<Body> {
    let payload = json!({
        "text": text,
        "channel_name": "ops",
        "team_id": "T123",
        "user_id": "U123",
        "user_name": "atmos",
        "github_token": "gho_token"
    });
    Request::builder()
        .method("POST")
        .uri("/commands")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_says_hi() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "hi": "deploybot" }));
}

#[tokio::test]
async fn test_version_reports_package_version() {
    let response = app()
        .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_successful_deploy_returns_empty_reply() {
    let response = app()
        .oneshot(command_request("deploy hubot to production"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_unknown_environment_reply_is_in_channel() {
    let response = app()
        .oneshot(command_request("deploy hubot to mars"))
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({
            "response_type": "in_channel",
            "text": "Unable to find an environment called mars. Available environments: production"
        })
    );
}

#[tokio::test]
async fn test_unknown_task_lists_help() {
    let response = app().oneshot(command_request("launch rockets")).await.unwrap();

    let body = body_json(response).await;
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("deploy <pipeline>"));
    assert!(text.contains("pipelines - View available pipelines."));
    assert!(text.contains("releases -a APP"));
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/commands")
        .header("content-type", "application/json")
        .body(Body::from("{\"text\": 1}"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}
