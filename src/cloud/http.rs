//! HTTP utilities for cloud REST API calls

use crate::error::{self, Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LINK};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.chars().count() > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Request payload
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Raw { data: Vec<u8>, content_type: String },
}

/// Everything about a request except its method and URL
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Body,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn raw(mut self, data: Vec<u8>, content_type: &str) -> Self {
        self.body = Body::Raw {
            data,
            content_type: content_type.to_string(),
        };
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn queries<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query.extend(params);
        self
    }

    /// Add a header, rejecting names or values that are not valid HTTP
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidRequest(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidRequest(format!("invalid value for header {}", name)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// A successful response, fully buffered
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    /// Parse the body as JSON; an empty body parses as `null`
    pub fn json(&self) -> Result<Value> {
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Target of an RFC 5988 `Link: <...>; rel="next"` header
    pub fn next_link(&self) -> Option<String> {
        self.headers
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_next_link)
    }
}

/// Find the `rel="next"` target in a Link header value
pub fn parse_next_link(header: &str) -> Option<String> {
    for link in header.split(',') {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            match param.split_once('=') {
                Some((key, value)) => {
                    key.trim().eq_ignore_ascii_case("rel")
                        && value.trim().trim_matches('"').split_whitespace().any(|r| r == "next")
                },
                None => false,
            }
        });
        if is_next && target.starts_with('<') && target.ends_with('>') {
            return Some(target[1..target.len() - 1].to_string());
        }
    }
    None
}

/// HTTP client wrapper for cloud API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// Create a new HTTP client with a per-request timeout
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("ostack/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Send a request and buffer the response
    ///
    /// Non-success statuses are turned into the matching [`Error`] variant.
    pub async fn send(&self, method: Method, url: &str, opts: &RequestOptions) -> Result<Response> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .headers(opts.headers.clone());

        if !opts.query.is_empty() {
            request = request.query(&opts.query);
        }

        request = match &opts.body {
            Body::Empty => request,
            Body::Json(body) => request.json(body),
            Body::Raw { data, content_type } => request
                .header(CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
        };

        let response = request.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error: {} - {}",
                status,
                sanitize_for_log(&String::from_utf8_lossy(&body))
            );
            return Err(error::from_response(status, &headers, &body, url));
        }

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Format an SDK error for terminal display
pub fn format_error(error: &Error) -> String {
    match error.status().map(|s| s.as_u16()) {
        Some(401) => "Authentication failed. Check the token in your cloud configuration.".to_string(),
        Some(403) => "Permission denied.".to_string(),
        Some(404) => "Resource not found.".to_string(),
        Some(409) => "Resource conflict. The resource may already exist or be in use.".to_string(),
        Some(413) | Some(429) => "Rate limit or quota exceeded. Please try again later.".to_string(),
        Some(400) => format!(
            "Invalid request: {}",
            error.http().map(|e| e.message.as_str()).unwrap_or("-")
        ),
        Some(code) if code >= 500 => "Service temporarily unavailable. Please try again.".to_string(),
        _ => error.to_string(),
    }
}
