//! Error types for ostack
//!
//! HTTP failures are mapped onto a small taxonomy so callers can match on
//! the cases they care about (not-found, conflict, ...) and propagate the rest.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias using the SDK error
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length of an error body kept as `details`
const MAX_DETAILS_LENGTH: usize = 512;

/// Headers the server uses to report its request id
const REQUEST_ID_HEADERS: &[&str] = &["x-openstack-request-id", "x-compute-request-id"];

/// A failed HTTP response
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
    pub request_id: Option<String>,
    pub url: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}: {}", self.status, self.url, self.message)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " (request id {})", request_id)?;
        }
        Ok(())
    }
}

/// SDK error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(HttpError),

    #[error("Bad request: {0}")]
    BadRequest(HttpError),

    #[error("Forbidden: {0}")]
    Forbidden(HttpError),

    #[error("Conflict: {0}")]
    Conflict(HttpError),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(HttpError),

    #[error("HTTP error: {0}")]
    Http(HttpError),

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("{0}")]
    DuplicateResource(String),

    #[error("{0}")]
    ResourceTimeout(String),

    #[error("{0}")]
    ResourceFailure(String),

    #[error("{method} is not supported for {kind}")]
    MethodNotSupported { kind: String, method: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid query: {0}")]
    InvalidResourceQuery(String),

    #[error("No endpoint configured for service {0}")]
    EndpointNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Sdk(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for HTTP 404 and for failed name-or-id lookups
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::ResourceNotFound(_))
    }

    /// The underlying HTTP error, if this error came from a response
    pub fn http(&self) -> Option<&HttpError> {
        match self {
            Error::NotFound(e)
            | Error::BadRequest(e)
            | Error::Forbidden(e)
            | Error::Conflict(e)
            | Error::PreconditionFailed(e)
            | Error::Http(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP status code, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.http().map(|e| e.status)
    }

    pub(crate) fn not_supported(kind: &str, method: &str) -> Self {
        Error::MethodNotSupported {
            kind: kind.to_string(),
            method: method.to_string(),
        }
    }
}

/// Build the error for a non-success response
pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &[u8], url: &str) -> Error {
    let text = String::from_utf8_lossy(body);
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    let message = parsed
        .as_ref()
        .and_then(extract_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    let details = if text.trim().is_empty() {
        None
    } else {
        Some(text.chars().take(MAX_DETAILS_LENGTH).collect())
    };

    let request_id = REQUEST_ID_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    });

    let err = HttpError {
        status,
        message,
        details,
        request_id,
        url: url.to_string(),
    };

    match status {
        StatusCode::NOT_FOUND => Error::NotFound(err),
        StatusCode::BAD_REQUEST => Error::BadRequest(err),
        StatusCode::FORBIDDEN => Error::Forbidden(err),
        StatusCode::CONFLICT => Error::Conflict(err),
        StatusCode::PRECONDITION_FAILED => Error::PreconditionFailed(err),
        _ => Error::Http(err),
    }
}

/// Pull a human readable message out of the usual error body shapes
fn extract_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;

    for key in ["message", "faultstring"] {
        if let Some(msg) = obj.get(key).and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
    }

    for key in ["error", "NeutronError"] {
        if let Some(msg) = obj
            .get(key)
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
        {
            return Some(msg.to_string());
        }
    }

    // {"itemNotFound": {"code": 404, "message": "..."}}
    if obj.len() == 1 {
        if let Some(msg) = obj
            .values()
            .next()
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
        {
            return Some(msg.to_string());
        }
    }

    None
}
