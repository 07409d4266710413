use am_domain::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Thin wrapper around a [`SqlitePool`] that owns schema migration.
///
/// Grounded on the teacher pack's `SqliteStore::connect`/`in_memory`/`from_pool`
/// constructor trio (`mofa-foundation/src/persistence/sqlite.rs`).
#[derive(Clone)]
pub struct SqliteHandle {
    pool: SqlitePool,
}

impl SqliteHandle {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Store(format!("connect: {e}")))?
            .foreign_keys(true)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(format!("connect: {e}")))?;
        let handle = SqliteHandle { pool };
        handle.run_migrations().await?;
        Ok(handle)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteHandle { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the `web_services`, `tests`, `test_results` tables if absent.
    /// Matches the persisted table layout in spec.md §6 verbatim.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS web_services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL UNIQUE,
                schema TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                favicon TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("migrate web_services: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tests (
                id TEXT PRIMARY KEY,
                web_service_id INTEGER NOT NULL REFERENCES web_services(id) ON DELETE CASCADE,
                name TEXT NOT NULL DEFAULT '',
                path TEXT NOT NULL,
                method TEXT NOT NULL,
                content_type TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                parameters TEXT NOT NULL DEFAULT '{}',
                schedule VARCHAR(5) NOT NULL,
                timeout INTEGER NOT NULL DEFAULT 0,
                assertion TEXT NOT NULL,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("migrate tests: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS test_results (
                id TEXT PRIMARY KEY,
                test_id TEXT NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
                is_success INTEGER NOT NULL,
                status_code INTEGER NOT NULL,
                response TEXT NOT NULL,
                response_time INTEGER NOT NULL,
                tested_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("migrate test_results: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_test_results_tested_at \
             ON test_results(tested_at, status_code, is_success)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("migrate test_results index: {e}")))?;

        Ok(())
    }
}
