use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method as HttpMethod};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use am_domain::config::{Config, ConfigSeverity, CorsConfig};
use am_scheduler::ScheduleManager;
use am_store::{SqlCatalogStore, SqlResultStore, SqliteHandle};

use am_gateway::api;
use am_gateway::cli::{self, Cli, Command};
use am_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = Cli::parse();

    match parsed.command {
        None | Some(Command::Serve) => {
            let (config, _config_path) = cli::load_config()?;
            init_tracing(&config);
            run_server(Arc::new(config)).await
        }
        Some(Command::ConfigValidate) => {
            let (config, config_path) = cli::load_config()?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            let errors = issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count();
            if errors > 0 {
                eprintln!("{config_path}: {errors} error(s)");
                std::process::exit(1);
            }
            println!("{config_path}: ok");
            Ok(())
        }
        Some(Command::Version) => {
            println!("apimonitor {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured tracing, matching the teacher's `init_tracing()`: JSON output
/// when `logger.format == "json"`, a compact human formatter otherwise.
/// `EnvFilter` still wins when `RUST_LOG` is set.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.logger.level)));
    if config.logger.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn default_filter(level: &str) -> String {
    let level = match level {
        "" => "info",
        other => other,
    };
    format!("{level},am_gateway=debug,am_scheduler=debug")
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("apimonitor starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Database ─────────────────────────────────────────────────────
    // The Catalog/Result Store is SQLite by default (Postgres-capable per
    // SPEC_FULL.md §6.1, not wired up in this build). `db.host == ":memory:"`
    // opts into an ephemeral in-process database for local runs/tests.
    let database_url = if config.db.host == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite://{}.db", config.db.name)
    };
    let handle = SqliteHandle::connect(&database_url, 10)
        .await
        .with_context(|| format!("connecting to {database_url}"))?;
    tracing::info!(url = %database_url, "catalog/result store ready");

    let catalog = Arc::new(SqlCatalogStore::new(handle.clone()));
    let results = Arc::new(SqlResultStore::new(handle));

    // ── Schedule Manager bootstrap ───────────────────────────────────
    let manager = ScheduleManager::with_capacities(
        catalog.clone(),
        results.clone(),
        config.scheduler.results_capacity,
        config.scheduler.errors_capacity,
    );
    manager.init().await.context("scheduler bootstrap (Init)")?;
    tracing::info!("schedule manager initialized from catalog");

    let run_manager = manager.clone();
    tokio::spawn(async move { run_manager.run().await });

    let state = AppState {
        config: config.clone(),
        catalog,
        results,
        manager: manager.clone(),
    };

    // ── CORS / concurrency / tracing layers ──────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);
    let max_concurrent = config.server.max_concurrent_requests;
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "apimonitor listening");

    let shutdown_manager = manager.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, closing schedulers");
            shutdown_manager.close().await;
        })
        .await
        .context("axum server error")?;

    Ok(())
}

/// Builds a [`CorsLayer`] from the configured allowed origins. A trailing
/// `:*` allows any port on that host; a single `"*"` entry allows every
/// origin (flagged as a `ConfigSeverity::Warning` by `Config::validate`).
/// Mirrors the teacher's `main.rs::build_cors_layer` origin-partitioning
/// logic.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                HttpMethod::GET,
                HttpMethod::POST,
                HttpMethod::PUT,
                HttpMethod::DELETE,
                HttpMethod::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if let Some(prefix) = origin.strip_suffix('*') {
            wildcard_prefixes.push(prefix.to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            HttpMethod::GET,
            HttpMethod::POST,
            HttpMethod::PUT,
            HttpMethod::DELETE,
            HttpMethod::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
