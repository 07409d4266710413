use serde::{Deserialize, Serialize};

/// Connection settings for the Catalog/Result Store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default = "d_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            host: d_host(),
            name: d_name(),
            username: d_username(),
            password: String::new(),
            port: d_port(),
            verbose: false,
        }
    }
}

fn d_host() -> String {
    "localhost".into()
}
fn d_name() -> String {
    "apimonitor".into()
}
fn d_username() -> String {
    "apimonitor".into()
}
fn d_port() -> u16 {
    5432
}
