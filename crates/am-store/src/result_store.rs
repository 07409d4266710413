use am_domain::error::{Error, Result};
use am_domain::model::{IsSuccessFilter, TestResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::pool::SqliteHandle;

/// Append-only result history. `append_result` never blocks the caller on
/// anything but the write itself; foreign-key violations (parent test
/// deleted mid-flight) and duplicate ids are both non-fatal per spec.md §6.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn append_result(&self, result: &TestResult) -> Result<()>;
    async fn list_results_by_test(
        &self,
        test_id: &str,
        offset: i64,
        limit: i64,
        is_success: IsSuccessFilter,
    ) -> Result<(Vec<TestResult>, i64)>;
    async fn list_results_by_web_service(
        &self,
        web_service_id: i64,
        offset: i64,
        limit: i64,
        is_success: IsSuccessFilter,
    ) -> Result<(Vec<TestResult>, i64)>;
}

pub struct SqlResultStore {
    handle: SqliteHandle,
}

impl SqlResultStore {
    pub fn new(handle: SqliteHandle) -> Self {
        SqlResultStore { handle }
    }

    fn parse_row(row: &SqliteRow) -> Result<TestResult> {
        let id_str: String = row.try_get("id").map_err(|e| Error::Store(e.to_string()))?;
        let tested_at: String = row
            .try_get("tested_at")
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(TestResult {
            id: uuid::Uuid::parse_str(&id_str).map_err(|e| Error::Store(e.to_string()))?,
            test_id: row.try_get("test_id").map_err(|e| Error::Store(e.to_string()))?,
            is_success: row
                .try_get::<i64, _>("is_success")
                .map_err(|e| Error::Store(e.to_string()))?
                != 0,
            status_code: row
                .try_get("status_code")
                .map_err(|e| Error::Store(e.to_string()))?,
            response: row.try_get("response").map_err(|e| Error::Store(e.to_string()))?,
            response_time_ms: row
                .try_get("response_time")
                .map_err(|e| Error::Store(e.to_string()))?,
            tested_at: parse_rfc3339(&tested_at)?,
        })
    }
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("timestamp {raw:?}: {e}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl ResultStore for SqlResultStore {
    async fn append_result(&self, result: &TestResult) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO test_results
            (id, test_id, is_success, status_code, response, response_time, tested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.id.to_string())
        .bind(&result.test_id)
        .bind(result.is_success as i64)
        .bind(result.status_code)
        .bind(&result.response)
        .bind(result.response_time_ms)
        .bind(result.tested_at.to_rfc3339())
        .execute(self.handle.pool())
        .await;

        match inserted {
            Ok(_) => Ok(()),
            // A duplicate id should never occur (fresh UUID per execution) but
            // is idempotent per spec.md §6: the row already exists, done.
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(result_id = %result.id, "duplicate result id, ignoring");
                Ok(())
            }
            Err(e) if is_foreign_key_violation(&e) => {
                tracing::warn!(test_id = %result.test_id, "result for vanished test, dropping");
                Err(Error::ForeignKey(result.test_id.clone()))
            }
            Err(e) => Err(Error::Store(format!("append_result: {e}"))),
        }
    }

    async fn list_results_by_test(
        &self,
        test_id: &str,
        offset: i64,
        limit: i64,
        is_success: IsSuccessFilter,
    ) -> Result<(Vec<TestResult>, i64)> {
        let (where_clause, bind_success) = match is_success.0 {
            Some(v) => (" AND is_success = ?", Some(v as i64)),
            None => ("", None),
        };

        let sql = format!(
            "SELECT * FROM test_results WHERE test_id = ?{where_clause} \
             ORDER BY tested_at DESC LIMIT ? OFFSET ?"
        );
        let mut query = sqlx::query(&sql).bind(test_id);
        if let Some(v) = bind_success {
            query = query.bind(v);
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("list_results_by_test: {e}")))?;
        let items = rows.iter().map(Self::parse_row).collect::<Result<Vec<_>>>()?;

        let count_sql = format!("SELECT COUNT(*) AS count FROM test_results WHERE test_id = ?{where_clause}");
        let mut count_query = sqlx::query(&count_sql).bind(test_id);
        if let Some(v) = bind_success {
            count_query = count_query.bind(v);
        }
        let total: i64 = count_query
            .fetch_one(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("count test_results: {e}")))?
            .try_get("count")
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok((items, total))
    }

    async fn list_results_by_web_service(
        &self,
        web_service_id: i64,
        offset: i64,
        limit: i64,
        is_success: IsSuccessFilter,
    ) -> Result<(Vec<TestResult>, i64)> {
        let (success_clause, bind_success) = match is_success.0 {
            Some(v) => (" AND r.is_success = ?", Some(v as i64)),
            None => ("", None),
        };

        let sql = format!(
            "SELECT r.* FROM test_results r \
             JOIN tests t ON t.id = r.test_id \
             WHERE t.web_service_id = ?{success_clause} \
             ORDER BY r.tested_at DESC LIMIT ? OFFSET ?"
        );
        let mut query = sqlx::query(&sql).bind(web_service_id);
        if let Some(v) = bind_success {
            query = query.bind(v);
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("list_results_by_web_service: {e}")))?;
        let items = rows.iter().map(Self::parse_row).collect::<Result<Vec<_>>>()?;

        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM test_results r \
             JOIN tests t ON t.id = r.test_id \
             WHERE t.web_service_id = ?{success_clause}"
        );
        let mut count_query = sqlx::query(&count_sql).bind(web_service_id);
        if let Some(v) = bind_success {
            count_query = count_query.bind(v);
        }
        let total: i64 = count_query
            .fetch_one(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("count test_results: {e}")))?
            .try_get("count")
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok((items, total))
    }
}
