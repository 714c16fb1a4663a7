//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use petroagent::acquisition::WellRegistry;
use petroagent::agents::Orchestrator;
use petroagent::api::{create_app, ApiState};
use petroagent::config::ScreeningConfig;
use petroagent::llm::build_producer;
use petroagent::storage::DecisionMemory;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn create_test_state() -> (TempDir, ApiState) {
    let dir = tempfile::tempdir().unwrap();
    let config = ScreeningConfig::default();
    let memory = Arc::new(DecisionMemory::open(dir.path().join("memory.json"), 7).unwrap());
    let orchestrator = Orchestrator::from_config(&config, build_producer(&config).unwrap(), memory);
    let wells = WellRegistry::from_value(json!({
        "A1": {"current_rate": 450, "potential_rate": 800, "mechanical_issues": "None"},
        "B2": {"current_rate": 200, "potential_rate": 900, "mechanical_issues": "Casing Collapse"},
        "Z9": {"mechanical_issues": "None"}
    }))
    .unwrap();
    (dir, ApiState::new(Arc::new(orchestrator), Arc::new(wells)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// All GET endpoints should return 200 with the envelope.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let (_dir, state) = create_test_state();
    for endpoint in ["/api/v1/health", "/api/v1/wells", "/api/v1/wells/A1", "/api/v1/memory/stats"] {
        let (status, body) = send(create_app(state.clone()), get(endpoint)).await;
        assert_eq!(status, StatusCode::OK, "{endpoint}");
        assert!(body.get("data").is_some(), "{endpoint} missing data");
        assert_eq!(body["meta"]["version"], "1");
    }
}

#[tokio::test]
async fn test_wells_listing() {
    let (_dir, state) = create_test_state();
    let (_, body) = send(create_app(state), get("/api/v1/wells")).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["well_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["A1", "B2", "Z9"]);
}

#[tokio::test]
async fn test_unknown_well_is_404() {
    let (_dir, state) = create_test_state();
    let (status, body) = send(create_app(state.clone()), get("/api/v1/wells/NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        create_app(state.clone()),
        post_json("/api/v1/wells/NOPE/diagnose", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        create_app(state.clone()),
        post_json(
            "/api/v1/wells/NOPE/override",
            &json!({"job_type": "Acid Job", "execution_date": "2025-03-01"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (_, body) = send(create_app(state), get("/api/v1/memory/stats")).await;
    assert_eq!(body["data"]["record_count"], 0);
}

#[tokio::test]
async fn test_diagnose_then_cache_hit() {
    let (_dir, state) = create_test_state();

    let (status, body) = send(
        create_app(state.clone()),
        post_json("/api/v1/wells/B2/diagnose", &json!({"force_refresh": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["origin"], "fresh");
    assert_eq!(body["data"]["verdict"], "vetoed");
    assert_eq!(body["data"]["decision"]["proposed_job_type"], "NO GO");
    assert_eq!(body["data"]["integrity"]["blocking_flag"], true);

    // No body at all defaults to force_refresh = false
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/wells/B2/diagnose")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(create_app(state.clone()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["origin"], "cache_hit");
    assert!(body["data"].get("production").is_none());

    let (_, body) = send(create_app(state), get("/api/v1/memory/stats")).await;
    assert_eq!(body["data"]["record_count"], 1);
    assert!(body["data"]["last_query_time"].is_string());
}

#[tokio::test]
async fn test_capability_failure_is_502() {
    let (_dir, state) = create_test_state();
    let (status, body) = send(
        create_app(state.clone()),
        post_json("/api/v1/wells/Z9/diagnose", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "CAPABILITY_FAILURE");

    let (_, body) = send(create_app(state), get("/api/v1/memory/stats")).await;
    assert_eq!(body["data"]["record_count"], 0);
}

#[tokio::test]
async fn test_override_flow() {
    let (_dir, state) = create_test_state();
    send(
        create_app(state.clone()),
        post_json("/api/v1/wells/B2/diagnose", &json!({})),
    )
    .await;

    let (status, body) = send(
        create_app(state.clone()),
        post_json(
            "/api/v1/wells/B2/override",
            &json!({"job_type": "Rig Workover", "execution_date": "2025-03-01"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "Human Supervisor");
    assert_eq!(body["data"]["integrity_block"], false);
    assert_eq!(
        body["data"]["technical_justification"],
        "HUMAN OVERRIDE: Approved by Senior Engineer."
    );

    let (_, body) = send(create_app(state), get("/api/v1/wells/B2")).await;
    assert_eq!(body["data"]["decision"]["proposed_job_type"], "Rig Workover");
}

#[tokio::test]
async fn test_malformed_override_is_400() {
    let (_dir, state) = create_test_state();
    let bad_requests = [
        json!({"job_type": "", "execution_date": "2025-03-01"}),
        json!({"job_type": "Acid Stimulation", "execution_date": "2025-02-30"}),
        json!({"job_type": "Acid Stimulation"}),
    ];
    for bad in &bad_requests {
        let (status, body) = send(
            create_app(state.clone()),
            post_json("/api/v1/wells/A1/override", bad),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(body["error"]["code"], "MALFORMED_OVERRIDE");
    }

    let (_, body) = send(create_app(state), get("/api/v1/memory/stats")).await;
    assert_eq!(body["data"]["record_count"], 0);
}
