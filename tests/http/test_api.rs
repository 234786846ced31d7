//! End-to-end tests for the HTTP API
//!
//! Requests go straight through the router with `oneshot`; no socket is bound.

use crate::common::TestPipeline;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use clauserag::api::{self, AppState};
use clauserag::auth::StaticTokenProvider;
use clauserag::commands::upload_file;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const ALICE: &str = "token-alice";
const BOB: &str = "token-bob";

fn create_test_app(t: &TestPipeline) -> Router {
    let tokens = HashMap::from([
        (ALICE.to_string(), "alice".to_string()),
        (BOB.to_string(), "bob".to_string()),
    ]);
    let state = AppState::new(t.ctx.clone(), Arc::new(StaticTokenProvider::new(tokens)));
    api::router(Arc::new(state))
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn ingest(app: &Router, t: &TestPipeline, token: &str, user: &str, text: &str) -> String {
    let path = upload_file(&t.ctx, user, "policy.txt", text.as_bytes())
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(post_json(
            "/ingest",
            Some(token),
            json!({"storage_path": path, "filename": "policy.txt"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    body["document_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);

    let response = app
        .clone()
        .oneshot(post_json("/query", None, json!({"query": "Is fire covered?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "unauthorized");

    let response = app
        .oneshot(post_json("/query", Some("nope"), json!({"query": "Is fire covered?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(t.synth.calls(), 0);
}

#[tokio::test]
async fn test_ingest_then_query() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);
    ingest(&app, &t, ALICE, "alice", "Water damage is covered if reported promptly.").await;

    let response = app
        .oneshot(post_json(
            "/query",
            Some(ALICE),
            json!({"query": "Is water damage covered?"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["covered"], true);
    assert_eq!(body["answer"], "Yes, water damage is covered.");
    assert!(body["conditions"].is_array());
}

#[tokio::test]
async fn test_fallback_answer_is_ok() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);
    t.synth.set_reply("Not JSON at all");

    let response = app
        .oneshot(post_json("/query", Some(ALICE), json!({"query": "Anything?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["answer"], "Not JSON at all");
    assert_eq!(body["covered"], false);
}

#[tokio::test]
async fn test_bad_bodies_are_bad_request() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);

    let response = app
        .clone()
        .oneshot(post_json("/query", Some(ALICE), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/ingest")
                .header(header::AUTHORIZATION, format!("Bearer {}", ALICE))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_documents_are_scoped_to_caller() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);
    let doc_id = ingest(&app, &t, ALICE, "alice", "Theft is covered.").await;

    let response = app.clone().oneshot(get("/documents", ALICE)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], doc_id.as_str());
    assert_eq!(body[0]["chunk_count"], 1);

    let response = app.clone().oneshot(get("/documents", BOB)).await.unwrap();
    let body = json_body(response).await;
    assert!(body.as_array().unwrap().is_empty());

    let uri = format!("/documents/{}/verify", doc_id);
    let response = app.clone().oneshot(get(&uri, ALICE)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["consistent"], true);

    let response = app.oneshot(get(&uri, BOB)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reindex_and_delete_routes() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);
    let doc_id = ingest(&app, &t, ALICE, "alice", "Storm damage is covered.").await;

    let response = app
        .clone()
        .oneshot(post_json("/reindex", Some(BOB), json!({"document_id": doc_id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(post_json("/reindex", Some(ALICE), json!({"document_id": doc_id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["chunk_count"], 1);

    let response = app
        .clone()
        .oneshot(post_json(
            "/delete",
            Some(ALICE),
            json!({"document_id": doc_id, "delete_file": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["chunks_deleted"], 1);
    assert_eq!(body["file_deleted"], true);

    let response = app
        .oneshot(post_json("/delete", Some(ALICE), json!({"document_id": doc_id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let t = TestPipeline::new().await;
    let app = create_test_app(&t);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/query")
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
