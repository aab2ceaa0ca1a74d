//! Session
//!
//! Combines credentials, the HTTP client and the per-service endpoint
//! catalog. Every request made by resources and proxies goes through here.

use super::auth::{Credentials, NoAuth, StaticToken};
use super::http::{HttpClient, RequestOptions, Response};
use crate::error::{Error, Result};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const MICROVERSION_HEADER: &str = "OpenStack-API-Version";
const GLOBAL_REQUEST_ID_HEADER: &str = "X-OpenStack-Request-ID";

/// Services the SDK knows how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    Compute,
    Network,
    BlockStorage,
    Identity,
    Image,
    ObjectStore,
}

impl ServiceType {
    pub const ALL: [ServiceType; 6] = [
        ServiceType::Compute,
        ServiceType::Network,
        ServiceType::BlockStorage,
        ServiceType::Identity,
        ServiceType::Image,
        ServiceType::ObjectStore,
    ];

    /// Catalog service type
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Compute => "compute",
            ServiceType::Network => "network",
            ServiceType::BlockStorage => "block-storage",
            ServiceType::Identity => "identity",
            ServiceType::Image => "image",
            ServiceType::ObjectStore => "object-store",
        }
    }

    /// Prefix of the per-service configuration keys
    pub fn config_key(self) -> &'static str {
        match self {
            ServiceType::Compute => "compute",
            ServiceType::Network => "network",
            ServiceType::BlockStorage => "block_storage",
            ServiceType::Identity => "identity",
            ServiceType::Image => "image",
            ServiceType::ObjectStore => "object_store",
        }
    }

    /// Name used in the microversion header, for services that have them
    fn microversion_name(self) -> Option<&'static str> {
        match self {
            ServiceType::Compute => Some("compute"),
            ServiceType::BlockStorage => Some("volume"),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compute" => Ok(ServiceType::Compute),
            "network" => Ok(ServiceType::Network),
            "block-storage" | "block_storage" | "volume" | "volumev3" => {
                Ok(ServiceType::BlockStorage)
            },
            "identity" => Ok(ServiceType::Identity),
            "image" => Ok(ServiceType::Image),
            "object-store" | "object_store" => Ok(ServiceType::ObjectStore),
            _ => Err(Error::Config(format!("unknown service type: {}", s))),
        }
    }
}

/// Where a service lives and which API version to ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub api_version: Option<String>,
}

/// Authenticated, endpoint-aware request handle
#[derive(Clone)]
pub struct Session {
    http: HttpClient,
    credentials: Credentials,
    endpoints: HashMap<ServiceType, Endpoint>,
    global_request_id: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credentials", &self.credentials)
            .field("endpoints", &self.endpoints)
            .field("global_request_id", &self.global_request_id)
            .finish()
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Endpoint configured for a service
    pub fn endpoint(&self, service: ServiceType) -> Result<&Endpoint> {
        self.endpoints
            .get(&service)
            .ok_or_else(|| Error::EndpointNotFound(service.to_string()))
    }

    pub fn global_request_id(&self) -> Option<&str> {
        self.global_request_id.as_deref()
    }

    /// Build a full URL from a service-relative path
    ///
    /// Absolute URLs (as found in pagination links) pass through untouched.
    pub fn url_for(&self, service: ServiceType, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(url::Url::parse(path)?.to_string());
        }

        let base = self.endpoint(service)?.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        };

        // Validate without normalizing, so trailing slashes survive
        url::Url::parse(&joined)?;
        Ok(joined)
    }

    /// Make a request against a service
    ///
    /// Adds the auth token, microversion and request id headers. A 401 is
    /// retried once with a fresh token when the token source can refresh.
    pub async fn request(
        &self,
        service: ServiceType,
        method: Method,
        path: &str,
        opts: RequestOptions,
    ) -> Result<Response> {
        let url = self.url_for(service, path)?;
        let mut opts = self.decorate(service, opts)?;

        let token = self.credentials.get_token().await?;
        let first = self
            .http
            .send(method.clone(), &url, &with_token(opts.clone(), token)?)
            .await;

        match first {
            Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) && self.credentials.can_refresh() => {
                tracing::debug!("Got 401 from {}, refreshing token and retrying", url);
                let token = self.credentials.refresh_token().await?;
                opts = with_token(opts, token)?;
                self.http.send(method, &url, &opts).await
            },
            other => other,
        }
    }

    fn decorate(&self, service: ServiceType, mut opts: RequestOptions) -> Result<RequestOptions> {
        if let Some(endpoint) = self.endpoints.get(&service) {
            if let (Some(name), Some(version)) =
                (service.microversion_name(), endpoint.api_version.as_deref())
            {
                if version.contains('.') && !opts.headers.contains_key(MICROVERSION_HEADER) {
                    opts = opts.header(MICROVERSION_HEADER, &format!("{} {}", name, version))?;
                }
            }
        }
        if let Some(id) = &self.global_request_id {
            opts = opts.header(GLOBAL_REQUEST_ID_HEADER, id)?;
        }
        if !opts.headers.contains_key(ACCEPT) {
            opts.headers
                .insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        Ok(opts)
    }
}

fn with_token(opts: RequestOptions, token: Option<String>) -> Result<RequestOptions> {
    match token {
        Some(token) => opts.header(AUTH_TOKEN_HEADER, &token),
        None => Ok(opts),
    }
}

/// Builder for [`Session`]
#[derive(Default)]
pub struct SessionBuilder {
    endpoints: HashMap<ServiceType, Endpoint>,
    credentials: Option<Credentials>,
    timeout: Option<Duration>,
    global_request_id: Option<String>,
}

impl SessionBuilder {
    pub fn endpoint(mut self, service: ServiceType, url: impl Into<String>) -> Self {
        let url = url.into();
        self.endpoints
            .entry(service)
            .and_modify(|e| e.url = url.clone())
            .or_insert(Endpoint {
                url,
                api_version: None,
            });
        self
    }

    /// Requested API version; only applied to endpoints that are configured
    pub fn api_version(mut self, service: ServiceType, version: impl Into<String>) -> Self {
        if let Some(endpoint) = self.endpoints.get_mut(&service) {
            endpoint.api_version = Some(version.into());
        }
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(StaticToken::new(token)));
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn global_request_id(mut self, id: impl Into<String>) -> Self {
        self.global_request_id = Some(id.into());
        self
    }

    /// Generate a `req-<uuid>` id shared by every request of this session
    pub fn generate_global_request_id(self) -> Self {
        let id = format!("req-{}", uuid::Uuid::new_v4());
        self.global_request_id(id)
    }

    pub fn build(self) -> Result<Session> {
        Ok(Session {
            http: HttpClient::with_timeout(self.timeout)?,
            credentials: self.credentials.unwrap_or_else(|| Credentials::new(NoAuth)),
            endpoints: self.endpoints,
            global_request_id: self.global_request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::builder()
            .endpoint(ServiceType::Compute, "https://compute.example.com/v2.1/")
            .api_version(ServiceType::Compute, "2.53")
            .endpoint(ServiceType::Image, "https://image.example.com")
            .build()
            .unwrap()
    }

    #[test]
    fn test_url_for_joins_paths() {
        let s = session();
        assert_eq!(
            s.url_for(ServiceType::Compute, "/servers/abc").unwrap(),
            "https://compute.example.com/v2.1/servers/abc"
        );
        assert_eq!(
            s.url_for(ServiceType::Image, "v2/images").unwrap(),
            "https://image.example.com/v2/images"
        );
    }

    #[test]
    fn test_url_for_passes_absolute_links() {
        let s = session();
        assert_eq!(
            s.url_for(ServiceType::Compute, "https://other.example.com/servers?marker=1")
                .unwrap(),
            "https://other.example.com/servers?marker=1"
        );
    }

    #[test]
    fn test_missing_endpoint() {
        let s = session();
        let err = s.url_for(ServiceType::Network, "/networks").unwrap_err();
        assert!(matches!(err, Error::EndpointNotFound(ref svc) if svc == "network"));
    }

    #[test]
    fn test_microversion_header_only_for_minor_versions() {
        let s = session();
        let opts = s.decorate(ServiceType::Compute, RequestOptions::new()).unwrap();
        assert_eq!(
            opts.headers.get(MICROVERSION_HEADER).unwrap(),
            "compute 2.53"
        );

        let s = Session::builder()
            .endpoint(ServiceType::Image, "https://image.example.com")
            .api_version(ServiceType::Image, "2")
            .build()
            .unwrap();
        let opts = s.decorate(ServiceType::Image, RequestOptions::new()).unwrap();
        assert!(opts.headers.get(MICROVERSION_HEADER).is_none());
        assert_eq!(opts.headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_service_type_parsing() {
        assert_eq!("volumev3".parse::<ServiceType>().unwrap(), ServiceType::BlockStorage);
        assert_eq!("object_store".parse::<ServiceType>().unwrap(), ServiceType::ObjectStore);
        assert!("dns".parse::<ServiceType>().is_err());
    }

    #[test]
    fn test_generated_request_id() {
        let s = Session::builder().generate_global_request_id().build().unwrap();
        assert!(s.global_request_id().unwrap().starts_with("req-"));
    }
}
