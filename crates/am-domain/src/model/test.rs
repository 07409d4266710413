use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_TIMEOUT_SECONDS: i64 = 5;

fn path_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^[/A-Za-z0-9_.\-~!$&'()*+,;=:@]+$").expect("static path regex is valid")
    })
}

fn content_type_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^(text|application|multipart)/(javascript|json|x-www-form-urlencoded|octet-stream|form-data|xml)(;.+)?$")
            .expect("static content-type regex is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Connect,
    Options,
    Trace,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            other => Err(Error::InvalidParameter(format!("method: {other}"))),
        }
    }
}

/// The recurring cadence a [`Test`] executes on. Each variant maps to exactly one
/// tick interval; there is no sub-variant granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "1d")]
    Daily,
}

impl Schedule {
    pub fn duration(&self) -> Duration {
        match self {
            Schedule::OneMinute => Duration::from_secs(60),
            Schedule::FiveMinutes => Duration::from_secs(5 * 60),
            Schedule::FifteenMinutes => Duration::from_secs(15 * 60),
            Schedule::ThirtyMinutes => Duration::from_secs(30 * 60),
            Schedule::Hourly => Duration::from_secs(60 * 60),
            Schedule::Daily => Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Schedule::OneMinute => "1m",
            Schedule::FiveMinutes => "5m",
            Schedule::FifteenMinutes => "15m",
            Schedule::ThirtyMinutes => "30m",
            Schedule::Hourly => "1h",
            Schedule::Daily => "1d",
        }
    }

    /// Parses a schedule token, defaulting an empty string to `1d` per ingress rules.
    /// Any other unrecognised token is rejected.
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "" => Ok(Schedule::Daily),
            "1m" => Ok(Schedule::OneMinute),
            "5m" => Ok(Schedule::FiveMinutes),
            "15m" => Ok(Schedule::FifteenMinutes),
            "30m" => Ok(Schedule::ThirtyMinutes),
            "1h" => Ok(Schedule::Hourly),
            "1d" => Ok(Schedule::Daily),
            other => Err(Error::InvalidSchedule(other.to_string())),
        }
    }
}

/// Probe timeout in whole seconds; zero (the serde default) means "use the 5s default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeout(#[serde(default)] pub i64);

impl Timeout {
    pub fn duration(&self) -> Duration {
        if self.0 <= 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECONDS as u64)
        } else {
            Duration::from_secs(self.0 as u64)
        }
    }
}

/// Declared request parameters a Test always sends on every probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Auth {
    Bearer { token: String },
    Basic { username: String, password: String },
}

/// Assertion v1: status-code equality against the observed response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssertionV1 {
    pub status_code: i32,
}

impl AssertionV1 {
    pub fn assert(&self, observed_status: Option<i32>) -> bool {
        observed_status == Some(self.status_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: String,
    pub web_service_id: i64,
    pub name: String,
    pub path: String,
    pub method: Method,
    pub content_type: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Parameters,
    pub schedule: Schedule,
    #[serde(default)]
    pub timeout: Timeout,
    pub assertion: AssertionV1,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestRequest {
    pub name: String,
    pub path: String,
    pub method: Method,
    pub content_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub schedule_token: String,
    pub assertion: AssertionV1,
    #[serde(default)]
    pub timeout: i64,
}

impl TestRequest {
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() || self.method_content_type_invalid() {
            return Err(Error::InvalidParameter("test".to_string()));
        }
        if !path_regex().is_match(&self.path) {
            return Err(Error::InvalidParameter("path".to_string()));
        }
        if !content_type_regex().is_match(&self.content_type) {
            return Err(Error::InvalidParameter("content_type".to_string()));
        }
        Ok(())
    }

    fn method_content_type_invalid(&self) -> bool {
        self.content_type.is_empty()
    }
}

impl Test {
    pub fn from_request(web_service_id: i64, request: TestRequest) -> Result<Self> {
        request.validate()?;
        let schedule = Schedule::from_token(&request.schedule_token)?;
        let now = Utc::now();
        Ok(Test {
            id: uuid::Uuid::new_v4().to_string(),
            web_service_id,
            name: request.name,
            path: request.path,
            method: request.method,
            content_type: request.content_type,
            description: request.description,
            parameters: request.parameters,
            schedule,
            timeout: Timeout(request.timeout),
            assertion: request.assertion,
            created_at: now,
            modified_at: now,
        })
    }

    pub fn apply_update(&mut self, request: TestRequest) -> Result<()> {
        request.validate()?;
        let schedule = Schedule::from_token(&request.schedule_token)?;
        self.name = request.name;
        self.path = request.path;
        self.method = request.method;
        self.content_type = request.content_type;
        self.description = request.description;
        self.parameters = request.parameters;
        self.schedule = schedule;
        self.timeout = Timeout(request.timeout);
        self.assertion = request.assertion;
        self.modified_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_schedule_token_defaults_to_daily() {
        assert_eq!(Schedule::from_token("").unwrap(), Schedule::Daily);
    }

    #[test]
    fn unknown_schedule_token_rejected() {
        assert!(Schedule::from_token("7m").is_err());
    }

    #[test]
    fn zero_timeout_defaults_to_five_seconds() {
        assert_eq!(Timeout(0).duration(), Duration::from_secs(5));
    }

    #[test]
    fn path_regex_rejects_space() {
        let req = TestRequest {
            name: "x".into(),
            path: "/a b".into(),
            method: Method::Get,
            content_type: "application/json".into(),
            description: String::new(),
            parameters: Parameters::default(),
            schedule_token: "1m".into(),
            assertion: AssertionV1 { status_code: 200 },
            timeout: 0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn assertion_matches_only_declared_status() {
        let assertion = AssertionV1 { status_code: 200 };
        assert!(assertion.assert(Some(200)));
        assert!(!assertion.assert(Some(500)));
        assert!(!assertion.assert(None));
    }
}
