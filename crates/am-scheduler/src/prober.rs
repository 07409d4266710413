//! HTTP Prober — issues the single request a [`Test`] declares and classifies
//! the outcome. Mirrors the original implementation's `Test.Execute`, rebuilt
//! on `reqwest` the way the digest pipeline builds its client.

use std::collections::BTreeMap;
use std::time::Instant;

use am_domain::error::{Error, ProbeErrorKind, Result};
use am_domain::model::{Auth, Test, WebService};

/// Cap on the response body we retain. Larger bodies are truncated, never
/// buffered in full; `response_truncated` tells the caller it happened.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status_code: i32,
    pub body: String,
    pub response_truncated: bool,
    pub response_time_ms: i64,
}

pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new() -> Self {
        Prober {
            client: reqwest::Client::new(),
        }
    }

    /// Executes `test` against `web_service`. Timing covers everything up to
    /// the response headers arriving, not the body read, so slow bodies don't
    /// inflate `response_time_ms` past what the assertion actually measures.
    pub async fn probe(&self, web_service: &WebService, test: &Test) -> Result<ProbeResponse> {
        let url = build_url(web_service, test);
        let mut builder = self
            .client
            .request(method_to_reqwest(&test.method), url)
            .timeout(test.timeout.duration());

        if !test.parameters.query.is_empty() {
            let sorted: BTreeMap<_, _> = test.parameters.query.iter().collect();
            builder = builder.query(&sorted);
        }

        for (key, value) in &test.parameters.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match &test.parameters.auth {
            Some(Auth::Bearer { token }) => builder.bearer_auth(token),
            Some(Auth::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            None => builder,
        };
        if let Some(body) = &test.parameters.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, test.content_type.as_str())
                .json(body);
        }

        let start = Instant::now();
        let result = builder.send().await;
        let response_time_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16() as i32;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| classify(&e))?;
                let truncated = bytes.len() > MAX_BODY_BYTES;
                let body = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BODY_BYTES)])
                    .into_owned();
                Ok(ProbeResponse {
                    status_code,
                    body,
                    response_truncated: truncated,
                    response_time_ms,
                })
            }
            Err(e) => Err(classify(&e)),
        }
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheme/host/path only — query parameters are attached separately via
/// `RequestBuilder::query`, which both percent-encodes values and preserves
/// determinism when fed the sorted `BTreeMap` in [`Prober::probe`].
fn build_url(web_service: &WebService, test: &Test) -> String {
    format!("{}://{}{}", web_service.scheme, web_service.host, test.path)
}

fn method_to_reqwest(method: &am_domain::model::Method) -> reqwest::Method {
    reqwest::Method::from_bytes(method.as_str().as_bytes()).expect("declared methods are valid")
}

/// Classifies a `reqwest::Error` into the probe error table. `Transport` is
/// the fallback for anything that isn't clearly a timeout, TLS, or DNS
/// failure.
fn classify(err: &reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        ProbeErrorKind::Timeout
    } else if is_tls_error(err) {
        ProbeErrorKind::Tls
    } else if is_resolve_error(err) {
        ProbeErrorKind::Resolve
    } else {
        ProbeErrorKind::Transport
    };
    Error::Probe {
        kind,
        message: err.to_string(),
    }
}

fn is_tls_error(err: &reqwest::Error) -> bool {
    source_chain(err).any(|s| {
        let s = s.to_lowercase();
        s.contains("tls") || s.contains("certificate") || s.contains("ssl")
    })
}

fn is_resolve_error(err: &reqwest::Error) -> bool {
    if !err.is_connect() {
        return false;
    }
    source_chain(err).any(|s| {
        let s = s.to_lowercase();
        s.contains("dns") || s.contains("resolve") || s.contains("lookup") || s.contains("name or service")
    })
}

fn source_chain(err: &reqwest::Error) -> impl Iterator<Item = String> + '_ {
    let mut next: Option<&(dyn std::error::Error + 'static)> = err.source();
    std::iter::from_fn(move || {
        let current = next?;
        next = current.source();
        Some(current.to_string())
    })
}
