//! `/v1/webservices` — catalog CRUD over web services, plus the nested
//! `tests` and `results` collections that hang off a web service id.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use am_domain::model::{IsSuccessFilter, TestRequest, WebServiceRequest};
use am_domain::pagination::{Page, PageRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/webservices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_web_service(
    State(state): State<AppState>,
    Json(req): Json<WebServiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let ws = state.catalog.create_web_service(req).await?;
    Ok((StatusCode::CREATED, Json(ws)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/webservices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_web_services(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let (items, total) = state
        .catalog
        .list_web_services(page.offset(), page.limit())
        .await?;
    Ok(Json(Page::new(page, total, items)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/webservices/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_web_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let ws = state.catalog.get_web_service_by_id(id).await?;
    Ok(Json(ws))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v1/webservices/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Recomputes `host`/`scheme` from the supplied host string. Every active
/// Scheduler for this web service's tests is rebuilt (replace-then-close)
/// so in-flight probes start using the new host on their next tick rather
/// than continuing to hit the stale one.
pub async fn update_web_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<WebServiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let ws = state.catalog.update_web_service(id, req).await?;
    let (tests, _total) = state
        .catalog
        .list_tests_by_web_service(id, 0, i64::MAX)
        .await?;
    for test in tests {
        let test_id = test.id.clone();
        if let Err(e) = state.manager.update_schedule(ws.clone(), test).await {
            tracing::warn!(test_id = %test_id, error = %e, "update_schedule found no prior scheduler");
        }
    }
    Ok(Json(ws))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/webservices/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deregisters every Scheduler owned by this web service's tests before the
/// cascading delete removes their rows, so no Scheduler outlives the Test
/// it was built from.
pub async fn delete_web_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let (tests, _total) = state
        .catalog
        .list_tests_by_web_service(id, 0, i64::MAX)
        .await?;
    for test in &tests {
        state.manager.remove_schedule(&test.id).await;
    }
    state.catalog.delete_web_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/webservices/:id/results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_web_service_results(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<super::results::ListResultsQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page();
    let filter = IsSuccessFilter::from_query(&query.is_success).map_err(ApiError::from)?;
    let (items, total) = state
        .results
        .list_results_by_web_service(id, page.offset(), page.limit(), filter)
        .await?;
    Ok(Json(Page::new(page, total, items)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/webservices/:id/tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Creates the Test row, then registers a Scheduler for it immediately —
/// a newly created Test starts ticking without waiting for the next
/// `Init()` bootstrap.
pub async fn create_test(
    State(state): State<AppState>,
    Path(web_service_id): Path<i64>,
    Json(req): Json<TestRequest>,
) -> ApiResult<impl IntoResponse> {
    let ws = state.catalog.get_web_service_by_id(web_service_id).await?;
    let test = state.catalog.create_test(web_service_id, req).await?;
    state.manager.add_schedule(ws, test.clone()).await;
    Ok((StatusCode::CREATED, Json(test)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/webservices/:id/tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_tests(
    State(state): State<AppState>,
    Path(web_service_id): Path<i64>,
    Query(page): Query<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let (items, total) = state
        .catalog
        .list_tests_by_web_service(web_service_id, page.offset(), page.limit())
        .await?;
    Ok(Json(Page::new(page, total, items)))
}
