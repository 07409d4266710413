use serde::{Deserialize, Serialize};

/// `level` ∈ {"","info","warn","debug","error","fatal"}, `format` ∈
/// {"","json","text"}, `output` ∈ {"","file","console"}; enforced by
/// [`super::Config::validate`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggerConfig {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub path: String,
}
