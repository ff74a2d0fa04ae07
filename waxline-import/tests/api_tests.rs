//! Integration tests for the HTTP API

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use waxline_common::events::EventBus;
use waxline_import::AppState;

async fn create_test_app() -> (axum::Router, sqlx::SqlitePool) {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    waxline_common::db::init_schema(&pool)
        .await
        .expect("schema init");

    let state = AppState::new(pool.clone(), EventBus::new(100));
    (waxline_import::build_router(state), pool)
}

fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-waxline-role", "admin")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn import_request() -> Value {
    json!({
        "source_name": "legacy.csv",
        "rows": [{
            "cells": [
                ["Artist Name", "Jane Doe"],
                ["Album/Single Name", "Starlight"],
                ["Song 1", "Opening"]
            ]
        }]
    })
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "waxline-import");
}

#[tokio::test]
async fn admin_role_is_required() {
    let (app, _pool) = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/import/start")
        .header("content-type", "application/json")
        .header("x-waxline-role", "staff")
        .body(Body::from(import_request().to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn start_import_runs_to_completion() {
    let (app, pool) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(admin_post("/import/start", import_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    assert_eq!(body["duplicate"], false);
    let session_id = body["session_id"].as_str().expect("session id").to_string();

    // The orchestrator runs in a background task
    let mut state = String::new();
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/import/status/{}", session_id))
                    .header("x-waxline-role", "admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = json_body(response).await;
        state = status["state"].as_str().unwrap_or("").to_string();
        if state != "in_progress" {
            break;
        }
    }
    assert_eq!(state, "completed");

    let releases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(releases, 1);
}

#[tokio::test]
async fn reimporting_same_source_returns_prior_session() {
    let (app, _pool) = create_test_app().await;

    let first = json_body(
        app.clone()
            .oneshot(admin_post("/import/start", import_request()))
            .await
            .unwrap(),
    )
    .await;
    let session_id = first["session_id"].as_str().unwrap().to_string();

    // Wait for completion so the second request hits the idempotence
    // guard rather than the running-session conflict
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let status = json_body(
            app.clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/import/status/{}", session_id))
                        .header("x-waxline-role", "admin")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap(),
        )
        .await;
        if status["state"] == "completed" {
            break;
        }
    }

    let response = app
        .oneshot(admin_post("/import/start", import_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["duplicate"], true);
    assert_eq!(body["session_id"].as_str().unwrap(), session_id);
}

#[tokio::test]
async fn unknown_session_status_is_404() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/import/status/{}", uuid::Uuid::new_v4()))
                .header("x-waxline-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_import_request_is_rejected() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(admin_post(
            "/import/start",
            json!({"source_name": "legacy.csv", "rows": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repair_titles_dry_run_reports_without_writing() {
    let (app, pool) = create_test_app().await;

    let artist_id = uuid::Uuid::new_v4();
    sqlx::query("INSERT INTO artists (id, name) VALUES (?, 'Jane Doe')")
        .bind(artist_id.to_string())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO releases (id, title, release_type, primary_artist_id) \
         VALUES (?, 'uploaded, monetized', 'single', ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(artist_id.to_string())
    .execute(&pool)
    .await
    .unwrap();

    let response = app
        .oneshot(admin_post("/repair/titles", json!({"dry_run": true})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json_body(response).await;
    assert_eq!(report["flagged"], 1);
    assert_eq!(report["fixed"], 0);

    let title: String = sqlx::query_scalar("SELECT title FROM releases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "uploaded, monetized");
}

#[tokio::test]
async fn merge_endpoint_moves_catalog() {
    let (app, pool) = create_test_app().await;

    let source = uuid::Uuid::new_v4();
    let target = uuid::Uuid::new_v4();
    for (id, name) in [(source, "Jane Do"), (target, "Jane Doe")] {
        sqlx::query("INSERT INTO artists (id, name) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(name)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query(
        "INSERT INTO releases (id, title, release_type, primary_artist_id) \
         VALUES (?, 'Starlight', 'single', ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(source.to_string())
    .execute(&pool)
    .await
    .unwrap();

    let response = app
        .oneshot(admin_post(
            "/artists/merge",
            json!({"source_id": source, "target_id": target}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let summary = json_body(response).await;
    assert_eq!(summary["releases_moved"], 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 1);
}
