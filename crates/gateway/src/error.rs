//! Error envelope: `{success:false, all:"<message>", code:<int>}`, HTTP
//! status mirroring the kind table in spec.md §7. Generalises the teacher's
//! `api_error(status, message) -> Response` helper into a blanket
//! `IntoResponse` impl over the domain error type, since every handler here
//! funnels through the same small taxonomy rather than a per-route message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use am_domain::error::Error;

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    all: String,
    code: i32,
}

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorEnvelope {
            success: false,
            all: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
