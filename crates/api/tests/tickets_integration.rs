//! Integration tests for token issuance and the ticket status view.
//!
//! These tests require a running PostgreSQL instance and are skipped when
//! `TEST_DATABASE_URL` is not set.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_issue_token_for_existing_ticket() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = common::create_test_app(pool.clone());
    let (event_id, ticket_id) = common::seed_party_of(&pool, 3).await;

    let response = app
        .clone()
        .oneshot(post(&format!("/api/v1/tickets/{}/token", ticket_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["ticket_id"], ticket_id.to_string());
    assert_eq!(body["event_id"], event_id.to_string());
    assert_eq!(body["party_size"], 3);
    assert_eq!(body["remaining_count"], 3);
    assert!(body["token"].as_str().unwrap().contains('.'));
    assert!(body["expires_at"].is_string());

    // Issuance is read-only.
    assert_eq!(common::remaining_count(&pool, ticket_id).await, 3);
    assert_eq!(common::scan_count(&pool, ticket_id).await, 0);
}

#[tokio::test]
async fn test_issue_token_for_missing_ticket_is_404() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = common::create_test_app(pool.clone());

    let response = app
        .clone()
        .oneshot(post(&format!("/api/v1/tickets/{}/token", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_ticket_status_reflects_admissions() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = common::create_test_app(pool.clone());
    let (event_id, ticket_id) = common::seed_party_of(&pool, 4).await;

    // Fresh ticket: untouched, no history.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/tickets/{}", ticket_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["state"], "untouched");
    assert_eq!(body["remaining_count"], 4);
    assert_eq!(body["scans"].as_array().unwrap().len(), 0);

    // Admit two, then check the view again.
    let token_response = app
        .clone()
        .oneshot(post(&format!("/api/v1/tickets/{}/token", ticket_id)))
        .await
        .unwrap();
    let token = parse_response_body(token_response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let scan = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/scans")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "token": token,
                "event_id": event_id,
                "scanned_by": "gate-1",
                "scanned_at": Utc::now().timestamp_millis(),
                "entry_quantity": 2
            }))
            .unwrap(),
        ))
        .unwrap();
    let scan_response = app.clone().oneshot(scan).await.unwrap();
    assert_eq!(scan_response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/tickets/{}", ticket_id)))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    assert_eq!(body["state"], "partially_admitted");
    assert_eq!(body["remaining_count"], 2);

    let scans = body["scans"].as_array().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0]["outcome"], "partially_admitted");
    assert_eq!(scans[0]["entry_count"], 2);
    assert_eq!(scans[0]["entered_names"].as_array().unwrap().len(), 2);
    assert_eq!(scans[0]["source"], "live");
}

#[tokio::test]
async fn test_ticket_status_for_missing_ticket_is_404() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = common::create_test_app(pool.clone());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/tickets/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
