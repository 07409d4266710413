//! `/v1/tests/:id/results` — result history for a single test, plus the
//! shared query-param shape both result-history endpoints parse.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use am_domain::model::IsSuccessFilter;
use am_domain::pagination::{Page, PageRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `page`/`num_item` flattened manually rather than via `#[serde(flatten)]`
/// — `serde_urlencoded` (what `axum::extract::Query` parses with) doesn't
/// reliably flatten nested structs, so the pagination fields are restated
/// here and assembled into a [`PageRequest`] in [`ListResultsQuery::page`].
#[derive(Debug, Deserialize)]
pub struct ListResultsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_num_item")]
    pub num_item: i64,
    #[serde(default)]
    pub is_success: String,
}

fn default_page() -> i64 {
    1
}

fn default_num_item() -> i64 {
    20
}

impl ListResultsQuery {
    pub fn page(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            num_item: self.num_item,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/tests/:id/results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_test_results(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Query(query): Query<ListResultsQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = query.page();
    let filter = IsSuccessFilter::from_query(&query.is_success).map_err(ApiError::from)?;
    let (items, total) = state
        .results
        .list_results_by_test(&test_id, page.offset(), page.limit(), filter)
        .await?;
    Ok(Json(Page::new(page, total, items)))
}
