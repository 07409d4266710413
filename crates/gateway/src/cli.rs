use clap::{Parser, Subcommand};

use am_domain::config::Config;

/// The API monitor gateway — catalog CRUD plus the scheduling core's HTTP surface.
#[derive(Debug, Parser)]
#[command(name = "apimonitor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Parse the config file and report any validation errors.
    ConfigValidate,
    /// Print version information.
    Version,
}

/// Resolves the config document from `APIMONITOR_CONFIG_PATH`, falling back
/// to `./config/server_config.toml`. A missing file yields `Config::default()`
/// rather than an error — every field defaults, so an unconfigured process
/// still starts (it just won't have a usable database).
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("APIMONITOR_CONFIG_PATH")
        .unwrap_or_else(|_| "config/server_config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}
