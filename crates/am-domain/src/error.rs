/// Shared error type used across the api monitor crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("web service not found: {0}")]
    WebServiceNotFound(String),

    #[error("test not found: {0}")]
    TestNotFound(String),

    #[error("result not found: {0}")]
    ResultNotFound(String),

    #[error("duplicate web service: {0}")]
    DuplicateWebService(String),

    #[error("duplicate test: {0}")]
    DuplicateTest(String),

    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("probe {kind}: {message}")]
    Probe { kind: ProbeErrorKind, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid schedule token: {0:?}")]
    InvalidSchedule(String),

    #[error("config: {0}")]
    Config(String),
}

/// Classification of [`Error::Probe`], per the HTTP Prober contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Timeout,
    Transport,
    Tls,
    Resolve,
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::Transport => "transport",
            ProbeErrorKind::Tls => "tls",
            ProbeErrorKind::Resolve => "resolve",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Numeric error code surfaced in the HTTP error envelope (`{success:false, all, code}`).
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidParameter(_) => 400,
            Error::InvalidSchedule(_) => 400,
            Error::WebServiceNotFound(_) => 4041,
            Error::TestNotFound(_) => 4042,
            Error::ResultNotFound(_) => 4043,
            Error::DuplicateWebService(_) => 4091,
            Error::DuplicateTest(_) => 4092,
            Error::ForeignKey(_) => 4041,
            Error::Probe { .. } => 500,
            Error::Store(_) => 500,
            Error::Config(_) => 500,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidParameter(_) | Error::InvalidSchedule(_) => 400,
            Error::WebServiceNotFound(_) | Error::TestNotFound(_) | Error::ResultNotFound(_) | Error::ForeignKey(_) => 404,
            Error::DuplicateWebService(_) | Error::DuplicateTest(_) => 409,
            Error::Probe { .. } | Error::Store(_) | Error::Config(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
