pub mod health;
pub mod results;
pub mod tests;
pub mod webservices;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the full API router. Grouped the way the teacher groups `api/mod.rs`
/// — one handler module per resource — but flat rather than split into
/// public/protected sub-routers: the spec carries no auth layer of its own.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health::health))
        .route(
            "/v1/webservices",
            post(webservices::create_web_service).get(webservices::list_web_services),
        )
        .route(
            "/v1/webservices/:id",
            get(webservices::get_web_service)
                .put(webservices::update_web_service)
                .delete(webservices::delete_web_service),
        )
        .route(
            "/v1/webservices/:id/results",
            get(webservices::list_web_service_results),
        )
        .route(
            "/v1/webservices/:id/tests",
            post(webservices::create_test).get(webservices::list_tests),
        )
        .route(
            "/v1/tests/:id",
            get(tests::get_test)
                .put(tests::update_test)
                .delete(tests::delete_test),
        )
        .route("/v1/tests/:id/execute", get(tests::execute_test))
        .route("/v1/tests/:id/results", get(results::list_test_results))
        .with_state(state)
}
