use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution of a Test. Immutable once created; a fresh UUID per execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: uuid::Uuid,
    pub test_id: String,
    pub is_success: bool,
    pub status_code: i32,
    pub response: String,
    pub response_time_ms: i64,
    pub tested_at: DateTime<Utc>,
}

impl TestResult {
    pub fn new(
        test_id: String,
        is_success: bool,
        status_code: i32,
        response: String,
        response_time_ms: i64,
    ) -> Self {
        TestResult {
            id: uuid::Uuid::new_v4(),
            test_id,
            is_success,
            status_code,
            response,
            response_time_ms,
            tested_at: Utc::now(),
        }
    }
}

/// `is_success` filter on results list endpoints: `None` means both, decoded at ingress
/// per the binding resolution of the "compare as raw string" open question.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsSuccessFilter(pub Option<bool>);

impl IsSuccessFilter {
    pub fn from_query(raw: &str) -> Result<Self, crate::error::Error> {
        match raw {
            "" => Ok(IsSuccessFilter(None)),
            "true" => Ok(IsSuccessFilter(Some(true))),
            "false" => Ok(IsSuccessFilter(Some(false))),
            other => Err(crate::error::Error::InvalidParameter(format!(
                "is_success: {other}"
            ))),
        }
    }
}
