//! REST endpoint handlers for the status API.
//!
//! All handlers read from the in-memory [`EngineStatus`] via the shared
//! [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness check, always `ok` |
//! | `GET` | `/api/status` | Engine summary and the latest tick report |
//! | `GET` | `/api/progress` | The last persisted progress record |
//! | `GET` | `/api/history` | Recent tick reports, newest first |
//!
//! [`EngineStatus`]: crate::state::EngineStatus

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;

use crate::error::ObserverError;
use crate::state::{AppState, MAX_RECENT_REPORTS};

/// Default number of reports returned by `GET /api/history`.
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Query parameters for `GET /api/history`.
#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of reports to return.
    pub limit: Option<usize>,
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// Engine summary with the most recent tick report.
///
/// `report` is `null` until the first corporation tick has been persisted.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status.read().await;
    let uptime_secs = Utc::now()
        .signed_duration_since(status.started_at)
        .num_seconds()
        .max(0);

    Json(serde_json::json!({
        "plan": status.plan,
        "mode": status.mode,
        "started_at": status.started_at,
        "uptime_secs": uptime_secs,
        "ticks": status.ticks,
        "report": status.report,
        "gang": status.gang,
    }))
}

/// The progress record as last persisted.
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let status = state.status.read().await;
    status
        .progress
        .clone()
        .map(Json)
        .ok_or_else(|| ObserverError::NotFound("no progress has been persisted yet".to_owned()))
}

/// Recent tick reports, newest first.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_RECENT_REPORTS {
        return Err(ObserverError::InvalidQuery(format!(
            "limit must be between 1 and {MAX_RECENT_REPORTS}"
        )));
    }

    let status = state.status.read().await;
    let reports = status.history(limit);
    Ok(Json(serde_json::json!({
        "count": reports.len(),
        "reports": reports,
    })))
}
