use std::str::FromStr;

use am_domain::error::{Error, Result};
use am_domain::model::{AssertionV1, Method, Parameters, Schedule, Test, TestRequest, Timeout, WebService, WebServiceRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::pool::SqliteHandle;

/// Durable catalog of web services and their tests.
///
/// Names and contracts are unchanged from spec.md §6: `ListAllTests`,
/// `GetTestById`, `CreateTest`, `UpdateTest`, `DeleteTest`, plus the
/// web-service CRUD the distillation scoped out of the core
/// (SPEC_FULL.md §6.1, grounded on `original_source/repositories/*.go`).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_all_tests(&self) -> Result<Vec<Test>>;
    async fn get_test_by_id(&self, id: &str) -> Result<Test>;
    async fn create_test(&self, web_service_id: i64, request: TestRequest) -> Result<Test>;
    async fn update_test(&self, id: &str, request: TestRequest) -> Result<Test>;
    async fn delete_test(&self, id: &str) -> Result<()>;
    async fn list_tests_by_web_service(
        &self,
        web_service_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Test>, i64)>;

    async fn create_web_service(&self, request: WebServiceRequest) -> Result<WebService>;
    async fn get_web_service_by_id(&self, id: i64) -> Result<WebService>;
    async fn update_web_service(&self, id: i64, request: WebServiceRequest) -> Result<WebService>;
    async fn delete_web_service(&self, id: i64) -> Result<()>;
    async fn list_web_services(&self, offset: i64, limit: i64) -> Result<(Vec<WebService>, i64)>;
}

pub struct SqlCatalogStore {
    handle: SqliteHandle,
}

impl SqlCatalogStore {
    pub fn new(handle: SqliteHandle) -> Self {
        SqlCatalogStore { handle }
    }

    fn parse_web_service_row(row: &SqliteRow) -> Result<WebService> {
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| Error::Store(e.to_string()))?;
        let modified_at: String = row
            .try_get("modified_at")
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(WebService {
            id: row.try_get("id").map_err(|e| Error::Store(e.to_string()))?,
            host: row.try_get("host").map_err(|e| Error::Store(e.to_string()))?,
            scheme: row.try_get("schema").map_err(|e| Error::Store(e.to_string()))?,
            description: row
                .try_get("description")
                .map_err(|e| Error::Store(e.to_string()))?,
            favicon: row.try_get("favicon").map_err(|e| Error::Store(e.to_string()))?,
            created_at: parse_rfc3339(&created_at)?,
            modified_at: parse_rfc3339(&modified_at)?,
        })
    }

    fn parse_test_row(row: &SqliteRow) -> Result<Test> {
        let method_str: String = row.try_get("method").map_err(|e| Error::Store(e.to_string()))?;
        let schedule_str: String = row
            .try_get("schedule")
            .map_err(|e| Error::Store(e.to_string()))?;
        let parameters_str: String = row
            .try_get("parameters")
            .map_err(|e| Error::Store(e.to_string()))?;
        let assertion_str: String = row
            .try_get("assertion")
            .map_err(|e| Error::Store(e.to_string()))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| Error::Store(e.to_string()))?;
        let modified_at: String = row
            .try_get("modified_at")
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok(Test {
            id: row.try_get("id").map_err(|e| Error::Store(e.to_string()))?,
            web_service_id: row
                .try_get("web_service_id")
                .map_err(|e| Error::Store(e.to_string()))?,
            name: row.try_get("name").map_err(|e| Error::Store(e.to_string()))?,
            path: row.try_get("path").map_err(|e| Error::Store(e.to_string()))?,
            method: Method::from_str(&method_str)?,
            content_type: row
                .try_get("content_type")
                .map_err(|e| Error::Store(e.to_string()))?,
            description: row
                .try_get("description")
                .map_err(|e| Error::Store(e.to_string()))?,
            parameters: serde_json::from_str::<Parameters>(&parameters_str)
                .map_err(|e| Error::Store(format!("parameters: {e}")))?,
            schedule: Schedule::from_token(&schedule_str)?,
            timeout: Timeout(row.try_get("timeout").map_err(|e| Error::Store(e.to_string()))?),
            assertion: serde_json::from_str::<AssertionV1>(&assertion_str)
                .map_err(|e| Error::Store(format!("assertion: {e}")))?,
            created_at: parse_rfc3339(&created_at)?,
            modified_at: parse_rfc3339(&modified_at)?,
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
impl CatalogStore for SqlCatalogStore {
    async fn list_all_tests(&self) -> Result<Vec<Test>> {
        let rows = sqlx::query("SELECT * FROM tests ORDER BY created_at ASC")
            .fetch_all(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("list_all_tests: {e}")))?;
        rows.iter().map(Self::parse_test_row).collect()
    }

    async fn get_test_by_id(&self, id: &str) -> Result<Test> {
        let row = sqlx::query("SELECT * FROM tests WHERE id = ?")
            .bind(id)
            .fetch_optional(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("get_test_by_id: {e}")))?;
        match row {
            Some(row) => Self::parse_test_row(&row),
            None => Err(Error::TestNotFound(id.to_string())),
        }
    }

    async fn create_test(&self, web_service_id: i64, request: TestRequest) -> Result<Test> {
        let test = Test::from_request(web_service_id, request)?;
        let parameters = serde_json::to_string(&test.parameters)
            .map_err(|e| Error::Store(format!("parameters: {e}")))?;
        let assertion = serde_json::to_string(&test.assertion)
            .map_err(|e| Error::Store(format!("assertion: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO tests
            (id, web_service_id, name, path, method, content_type, description,
             parameters, schedule, timeout, assertion, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&test.id)
        .bind(test.web_service_id)
        .bind(&test.name)
        .bind(&test.path)
        .bind(test.method.as_str())
        .bind(&test.content_type)
        .bind(&test.description)
        .bind(parameters)
        .bind(test.schedule.as_token())
        .bind(test.timeout.0)
        .bind(assertion)
        .bind(test.created_at.to_rfc3339())
        .bind(test.modified_at.to_rfc3339())
        .execute(self.handle.pool())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::WebServiceNotFound(web_service_id.to_string())
            } else {
                Error::Store(format!("create_test: {e}"))
            }
        })?;

        Ok(test)
    }

    async fn update_test(&self, id: &str, request: TestRequest) -> Result<Test> {
        let mut test = self.get_test_by_id(id).await?;
        test.apply_update(request)?;
        let parameters = serde_json::to_string(&test.parameters)
            .map_err(|e| Error::Store(format!("parameters: {e}")))?;
        let assertion = serde_json::to_string(&test.assertion)
            .map_err(|e| Error::Store(format!("assertion: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE tests SET
              name = ?, path = ?, method = ?, content_type = ?, description = ?,
              parameters = ?, schedule = ?, timeout = ?, assertion = ?, modified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&test.name)
        .bind(&test.path)
        .bind(test.method.as_str())
        .bind(&test.content_type)
        .bind(&test.description)
        .bind(parameters)
        .bind(test.schedule.as_token())
        .bind(test.timeout.0)
        .bind(assertion)
        .bind(test.modified_at.to_rfc3339())
        .bind(&test.id)
        .execute(self.handle.pool())
        .await
        .map_err(|e| Error::Store(format!("update_test: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(Error::TestNotFound(id.to_string()));
        }
        Ok(test)
    }

    async fn delete_test(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tests WHERE id = ?")
            .bind(id)
            .execute(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("delete_test: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(Error::TestNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_tests_by_web_service(
        &self,
        web_service_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Test>, i64)> {
        let rows = sqlx::query(
            "SELECT * FROM tests WHERE web_service_id = ? ORDER BY created_at ASC LIMIT ? OFFSET ?",
        )
        .bind(web_service_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.handle.pool())
        .await
        .map_err(|e| Error::Store(format!("list_tests_by_web_service: {e}")))?;
        let items = rows.iter().map(Self::parse_test_row).collect::<Result<Vec<_>>>()?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM tests WHERE web_service_id = ?")
            .bind(web_service_id)
            .fetch_one(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("count tests: {e}")))?
            .try_get("count")
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok((items, total))
    }

    async fn create_web_service(&self, request: WebServiceRequest) -> Result<WebService> {
        let (scheme, host) = WebService::parse_host(&request.host)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO web_services (host, schema, description, favicon, created_at, modified_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&host)
        .bind(&scheme)
        .bind(&request.desc)
        .bind(&request.favicon)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.handle.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::DuplicateWebService(host.clone())
            } else {
                Error::Store(format!("create_web_service: {e}"))
            }
        })?;

        Ok(WebService {
            id: result.last_insert_rowid(),
            host,
            scheme,
            description: request.desc,
            favicon: request.favicon,
            created_at: now,
            modified_at: now,
        })
    }

    async fn get_web_service_by_id(&self, id: i64) -> Result<WebService> {
        let row = sqlx::query("SELECT * FROM web_services WHERE id = ?")
            .bind(id)
            .fetch_optional(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("get_web_service_by_id: {e}")))?;
        match row {
            Some(row) => Self::parse_web_service_row(&row),
            None => Err(Error::WebServiceNotFound(id.to_string())),
        }
    }

    async fn update_web_service(&self, id: i64, request: WebServiceRequest) -> Result<WebService> {
        let mut service = self.get_web_service_by_id(id).await?;
        service.apply_update(&request)?;

        let result = sqlx::query(
            "UPDATE web_services SET host = ?, schema = ?, description = ?, favicon = ?, modified_at = ? \
             WHERE id = ?",
        )
        .bind(&service.host)
        .bind(&service.scheme)
        .bind(&service.description)
        .bind(&service.favicon)
        .bind(service.modified_at.to_rfc3339())
        .bind(id)
        .execute(self.handle.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::DuplicateWebService(service.host.clone())
            } else {
                Error::Store(format!("update_web_service: {e}"))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::WebServiceNotFound(id.to_string()));
        }
        Ok(service)
    }

    async fn delete_web_service(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM web_services WHERE id = ?")
            .bind(id)
            .execute(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("delete_web_service: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(Error::WebServiceNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_web_services(&self, offset: i64, limit: i64) -> Result<(Vec<WebService>, i64)> {
        let rows = sqlx::query("SELECT * FROM web_services ORDER BY created_at ASC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("list_web_services: {e}")))?;
        let items = rows
            .iter()
            .map(Self::parse_web_service_row)
            .collect::<Result<Vec<_>>>()?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM web_services")
            .fetch_one(self.handle.pool())
            .await
            .map_err(|e| Error::Store(format!("count web_services: {e}")))?
            .try_get("count")
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok((items, total))
    }
}
