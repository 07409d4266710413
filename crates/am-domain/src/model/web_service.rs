use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// `http(s)://host` or `//host`, capturing an optional scheme and a bare host.
/// Ported from the original implementation's host-extraction grammar.
fn host_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:(https?)?(?:\:?//))|(?://))?(((?:\w{1,100}\.)?\w{2,300}\.\w{2,100})(\.\w{2,100})*)",
        )
        .expect("static host regex is valid")
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebService {
    pub id: i64,
    pub host: String,
    pub scheme: String,
    pub description: String,
    pub favicon: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebServiceRequest {
    pub host: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub favicon: String,
}

impl WebService {
    /// Parses an operator-supplied host string into `(scheme, host)`, defaulting to `http`
    /// when no scheme is present. Rejects anything the restricted grammar doesn't match.
    pub fn parse_host(raw: &str) -> Result<(String, String)> {
        let captures = host_regex()
            .captures(raw)
            .ok_or_else(|| Error::InvalidParameter(format!("host: {raw}")))?;
        let host = captures
            .get(2)
            .ok_or_else(|| Error::InvalidParameter(format!("host: {raw}")))?
            .as_str()
            .to_string();
        let scheme = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http".to_string());
        Ok((scheme, host))
    }

    pub fn apply_update(&mut self, request: &WebServiceRequest) -> Result<()> {
        let (scheme, host) = Self::parse_host(&request.host)?;
        self.scheme = scheme;
        self.host = host;
        self.description = request.desc.clone();
        self.favicon = request.favicon.clone();
        self.modified_at = Utc::now();
        Ok(())
    }
}
