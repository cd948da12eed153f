//! Integration tests for the status API endpoints.
//!
//! Requests go through the router via `tower::ServiceExt` without binding
//! a socket.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use tycoon_core::{TickOutcome, TickReport};
use tycoon_observer::router::build_router;
use tycoon_observer::state::AppState;
use tycoon_types::ProgressState;

fn report(tick: u64, outcome: TickOutcome) -> TickReport {
    TickReport {
        tick,
        started_at: Utc::now(),
        phase: 3,
        sub_phase: 2,
        step: Some("milestone".to_owned()),
        outcome,
        reason: Some("offer 100000000000 for round 1 below threshold".to_owned()),
        funds: Some(2.5e9),
        pricing: Vec::new(),
        error: None,
    }
}

async fn state_after_ticks(ticks: u64) -> Arc<AppState> {
    let state = Arc::new(AppState::new("agriculture", "corporation"));
    let progress = ProgressState {
        phase: 3,
        sub_phase: 2,
        investment_round: 0,
        ..ProgressState::default()
    };
    {
        let mut status = state.status.write().await;
        for tick in 1..=ticks {
            status.record_tick(&report(tick, TickOutcome::WaitingExternal), &progress);
        }
    }
    state
}

async fn get(state: Arc<AppState>, path: &str) -> (StatusCode, Body) {
    let response = build_router(state)
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, response.into_body())
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = get(state_after_ticks(0).await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn status_has_no_report_before_first_tick() {
    let (status, body) = get(state_after_ticks(0).await, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(body).await;
    assert_eq!(json["plan"], "agriculture");
    assert_eq!(json["mode"], "corporation");
    assert_eq!(json["ticks"], 0);
    assert!(json["report"].is_null());
}

#[tokio::test]
async fn status_returns_latest_report() {
    let (status, body) = get(state_after_ticks(3).await, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(body).await;
    assert_eq!(json["ticks"], 3);
    assert_eq!(json["report"]["tick"], 3);
    assert_eq!(json["report"]["outcome"], "waiting_external");
    assert_eq!(json["report"]["step"], "milestone");
}

#[tokio::test]
async fn progress_not_found_before_first_save() {
    let (status, body) = get(state_after_ticks(0).await, "/api/progress").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json = body_to_json(body).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("progress"));
}

#[tokio::test]
async fn progress_returns_persisted_record() {
    let (status, body) = get(state_after_ticks(1).await, "/api/progress").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(body).await;
    assert_eq!(json["phase"], 3);
    assert_eq!(json["sub_phase"], 2);
    assert_eq!(json["investment_round"], 0);
    assert!(json["completion_flags"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let (status, body) = get(state_after_ticks(10).await, "/api/history?limit=4").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(body).await;
    assert_eq!(json["count"], 4);
    assert_eq!(json["reports"][0]["tick"], 10);
    assert_eq!(json["reports"][3]["tick"], 7);
}

#[tokio::test]
async fn history_rejects_zero_limit() {
    let (status, body) = get(state_after_ticks(2).await, "/api/history?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json = body_to_json(body).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn gang_status_is_reported() {
    let state = Arc::new(AppState::new("gang", "gang"));
    state
        .status
        .write()
        .await
        .record_gang_tick(5, Err("bridge unavailable"));

    let (status, body) = get(state, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    let json = body_to_json(body).await;
    assert_eq!(json["gang"]["tick"], 5);
    assert_eq!(json["gang"]["error"], "bridge unavailable");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, _) = get(state_after_ticks(0).await, "/api/agents").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
