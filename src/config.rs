//! Configuration Management
//!
//! Loads cloud settings from `clouds.yaml` and `OS_*` environment variables
//! and turns them into a [`Session`].
//!
//! ```yaml
//! clouds:
//!   devstack:
//!     auth:
//!       token: gAAAA...
//!       auth_url: https://keystone.example.com/v3
//!     compute_endpoint_override: https://nova.example.com/v2.1
//!     compute_api_version: "2.79"
//!     api_timeout: 30
//! ```

use crate::cloud::session::{ServiceType, Session};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CLOUDS_FILE: &str = "clouds.yaml";

/// Authentication section of a cloud entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub auth_url: Option<String>,
}

/// Settings of one cloud
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    /// Name of the entry in `clouds.yaml`, if one was used
    #[serde(skip)]
    pub name: Option<String>,
    pub auth: AuthConfig,
    /// Region the endpoints belong to; reported when connecting
    pub region_name: Option<String>,
    /// Per-request timeout in seconds
    pub api_timeout: Option<f64>,
    pub global_request_id: Option<String>,
    /// Everything else, e.g. `compute_endpoint_override`
    #[serde(flatten)]
    pub options: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudsFile {
    #[serde(default)]
    clouds: HashMap<String, CloudConfig>,
}

impl CloudConfig {
    /// Load from the first `clouds.yaml` found and the process environment
    pub fn load(cloud: Option<&str>) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("OS_"))
            .collect();

        let file = search_paths(&vars).into_iter().find(|path| path.is_file());
        let contents = match &file {
            Some(path) => {
                tracing::debug!("Loading cloud configuration from {:?}", path);
                Some(std::fs::read_to_string(path)?)
            },
            None => None,
        };

        Self::from_vars(cloud, contents.as_deref(), &vars)
    }

    /// Configuration from `OS_*` environment variables only
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("OS_"))
            .collect();
        Self::from_vars(None, None, &vars)
    }

    /// Select a cloud from `clouds_yaml` and overlay `vars`
    ///
    /// The cloud is `cloud`, else `OS_CLOUD`, else the only entry of the
    /// file.
    pub fn from_vars(
        cloud: Option<&str>,
        clouds_yaml: Option<&str>,
        vars: &HashMap<String, String>,
    ) -> Result<Self> {
        let file: CloudsFile = match clouds_yaml {
            Some(contents) => serde_yaml::from_str(contents)?,
            None => CloudsFile::default(),
        };

        let wanted = cloud
            .map(|c| c.to_string())
            .or_else(|| vars.get("OS_CLOUD").cloned());

        let mut config = match wanted {
            Some(name) => {
                let mut config = file.clouds.get(&name).cloned().ok_or_else(|| {
                    Error::Config(format!("cloud '{}' not found in {}", name, CLOUDS_FILE))
                })?;
                config.name = Some(name);
                config
            },
            None if file.clouds.len() == 1 => {
                let (name, config) = file.clouds.into_iter().next().unwrap_or_default();
                CloudConfig {
                    name: Some(name),
                    ..config
                }
            },
            None if file.clouds.is_empty() => CloudConfig::default(),
            None => {
                let mut names: Vec<_> = file.clouds.keys().cloned().collect();
                names.sort();
                return Err(Error::Config(format!(
                    "several clouds configured ({}), pick one with OS_CLOUD",
                    names.join(", ")
                )));
            },
        };

        config.apply_vars(vars);
        Ok(config)
    }

    fn apply_vars(&mut self, vars: &HashMap<String, String>) {
        for (key, value) in vars {
            match key.as_str() {
                "OS_CLOUD" | "OS_CLIENT_CONFIG_FILE" => {},
                "OS_TOKEN" | "OS_AUTH_TOKEN" => self.auth.token = Some(value.clone()),
                "OS_AUTH_URL" => self.auth.auth_url = Some(value.clone()),
                "OS_REGION_NAME" => self.region_name = Some(value.clone()),
                "OS_GLOBAL_REQUEST_ID" => self.global_request_id = Some(value.clone()),
                "OS_API_TIMEOUT" => match value.parse::<f64>() {
                    Ok(timeout) => self.api_timeout = Some(timeout),
                    Err(_) => tracing::warn!("Ignoring invalid OS_API_TIMEOUT '{}'", value),
                },
                other => {
                    if let Some(key) = other.strip_prefix("OS_") {
                        self.options.insert(
                            key.to_ascii_lowercase(),
                            serde_yaml::Value::String(value.clone()),
                        );
                    }
                },
            }
        }
    }

    fn option(&self, key: &str) -> Option<String> {
        match self.options.get(key)? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            other => {
                tracing::warn!("Ignoring non-scalar value for {}: {:?}", key, other);
                None
            },
        }
    }

    /// Endpoint for a service; identity falls back to `auth.auth_url`
    pub fn endpoint_override(&self, service: ServiceType) -> Option<String> {
        self.option(&format!("{}_endpoint_override", service.config_key()))
            .or_else(|| match service {
                ServiceType::Identity => self.auth.auth_url.clone(),
                _ => None,
            })
    }

    /// Requested API version for a service
    ///
    /// Quote versions in YAML: an unquoted `2.10` reads as the float `2.1`.
    pub fn api_version(&self, service: ServiceType) -> Option<String> {
        self.option(&format!("{}_api_version", service.config_key()))
    }

    /// Per-request timeout; unusable values are ignored with a warning
    pub fn timeout(&self) -> Option<Duration> {
        let seconds = self.api_timeout?;
        match Duration::try_from_secs_f64(seconds) {
            Ok(timeout) if !timeout.is_zero() => Some(timeout),
            _ => {
                tracing::warn!("Ignoring invalid api_timeout {}", seconds);
                None
            },
        }
    }

    /// Build a session with every configured endpoint
    pub fn session(&self) -> Result<Session> {
        let mut builder = Session::builder();

        for service in ServiceType::ALL {
            if let Some(url) = self.endpoint_override(service) {
                builder = builder.endpoint(service, url);
                if let Some(version) = self.api_version(service) {
                    builder = builder.api_version(service, version);
                }
            }
        }

        if let Some(token) = &self.auth.token {
            builder = builder.token(token.clone());
        }
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(id) = &self.global_request_id {
            builder = builder.global_request_id(id.clone());
        }

        builder.build()
    }
}

/// Candidate `clouds.yaml` locations, most specific first
fn search_paths(vars: &HashMap<String, String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(file) = vars.get("OS_CLIENT_CONFIG_FILE") {
        paths.push(PathBuf::from(file));
    }
    paths.push(PathBuf::from(CLOUDS_FILE));
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("openstack").join(CLOUDS_FILE));
    }
    paths.push(Path::new("/etc/openstack").join(CLOUDS_FILE));
    paths
}
