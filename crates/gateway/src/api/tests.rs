//! `/v1/tests/:id` — single-test CRUD plus the `execute` trigger that
//! dispatches `ExecuteNow` into the owning Scheduler.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use am_domain::model::TestRequest;

use crate::error::ApiResult;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/tests/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let test = state.catalog.get_test_by_id(&id).await?;
    Ok(Json(test))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v1/tests/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replace-then-close per spec.md §4.3/§9: the new Scheduler is built and
/// installed before the old one is told to close, so there is never a
/// window where `test.id` has no active Scheduler.
pub async fn update_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TestRequest>,
) -> ApiResult<impl IntoResponse> {
    let test = state.catalog.update_test(&id, req).await?;
    let ws = state.catalog.get_web_service_by_id(test.web_service_id).await?;
    if let Err(e) = state.manager.update_schedule(ws, test.clone()).await {
        tracing::warn!(test_id = %test.id, error = %e, "update_schedule found no prior scheduler");
    }
    Ok(Json(test))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/tests/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.catalog.delete_test(&id).await?;
    state.manager.remove_schedule(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/tests/:id/execute
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Always dispatches via the owning Scheduler (spec.md §9's resolved open
/// question) — there is no out-of-band probe path that bypasses a
/// registered Scheduler. The probe outcome is delivered through the normal
/// result channel, like any ticked execution; this endpoint only reports
/// whether the dispatch itself succeeded.
pub async fn execute_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.manager.execute_now(&id).await?;
    Ok(Json(serde_json::json!({ "test_id": id, "triggered": true })))
}
