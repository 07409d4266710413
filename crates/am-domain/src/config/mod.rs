mod db;
mod logger;
mod scheduler;
mod server;

pub use db::DbConfig;
pub use logger::LoggerConfig;
pub use scheduler::SchedulerConfig;
pub use server::{CorsConfig, ServerConfig};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level configuration document, aggregating the `db`/`logger`/`server`/
/// `scheduler` sections. Every field defaults so a missing TOML document
/// still yields a runnable (if unconfigured) `Config`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

const VALID_LOG_LEVELS: &[&str] = &["", "info", "warn", "debug", "error", "fatal"];
const VALID_LOG_FORMATS: &[&str] = &["", "json", "text"];
const VALID_LOG_OUTPUTS: &[&str] = &["", "file", "console"];

impl Config {
    /// Validates the document, mirroring `original_source`'s
    /// `dbConfigure.Validate()`/`logConfigure.Validate()` constraints.
    /// Returns an empty vec when there's nothing to report.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.db.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "db.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.db.username.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "db.username".into(),
                message: "username must not be empty".into(),
            });
        }
        if self.db.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "db.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logger.level.as_str()) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "logger.level".into(),
                message: format!(
                    "level must be one of {VALID_LOG_LEVELS:?} (got \"{}\")",
                    self.logger.level
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logger.format.as_str()) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "logger.format".into(),
                message: format!(
                    "format must be one of {VALID_LOG_FORMATS:?} (got \"{}\")",
                    self.logger.format
                ),
            });
        }
        if !VALID_LOG_OUTPUTS.contains(&self.logger.output.as_str()) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "logger.output".into(),
                message: format!(
                    "output must be one of {VALID_LOG_OUTPUTS:?} (got \"{}\")",
                    self.logger.output
                ),
            });
        }
        if self.logger.output == "file" && self.logger.path.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "logger.path".into(),
                message: "path is required when output = \"file\"".into(),
            });
        }

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if self.scheduler.results_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "scheduler.results_capacity".into(),
                message: "results_capacity must be greater than 0".into(),
            });
        }
        if self.scheduler.errors_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "scheduler.errors_capacity".into(),
                message: "errors_capacity must be greater than 0".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            environment: "test".into(),
            db: DbConfig {
                host: "localhost".into(),
                name: "apimonitor".into(),
                username: "apimonitor".into(),
                password: String::new(),
                port: 5432,
                verbose: false,
            },
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn empty_db_host_is_error() {
        let mut cfg = valid_config();
        cfg.db.host = String::new();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "db.host" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn unknown_log_level_is_error() {
        let mut cfg = valid_config();
        cfg.logger.level = "trace".into();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "logger.level" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn file_output_without_path_is_error() {
        let mut cfg = valid_config();
        cfg.logger.output = "file".into();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "logger.path" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "server.cors.allowed_origins")
            .expect("expected CORS wildcard warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn zero_scheduler_capacity_is_error() {
        let mut cfg = valid_config();
        cfg.scheduler.results_capacity = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "scheduler.results_capacity"));
    }
}
