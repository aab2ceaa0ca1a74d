//! Authentication
//!
//! Token acquisition is delegated: anything implementing [`TokenSource`]
//! can feed a session. A static token and an unauthenticated source ship here;
//! identity plugins (password, application credentials, ...) live elsewhere.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the source cannot tell us (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Something that can hand out auth tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a token. `None` sends requests unauthenticated.
    async fn token(&self) -> Result<Option<String>>;

    /// Whether asking again can yield a different token (used to retry on 401)
    fn can_refresh(&self) -> bool {
        false
    }
}

/// A pre-issued token
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(****)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// No authentication, for standalone services
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Token source plus cache
#[derive(Clone)]
pub struct Credentials {
    source: Arc<dyn TokenSource>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
    ttl: Duration,
}

#[derive(Clone)]
struct CachedToken {
    token: Option<String>,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ttl", &self.ttl)
            .field("can_refresh", &self.source.can_refresh())
            .finish()
    }
}

impl Credentials {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self::from_source(Arc::new(source))
    }

    pub fn from_source(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            token_cache: Arc::new(RwLock::new(None)),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Override how long a fetched token is trusted
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn can_refresh(&self) -> bool {
        self.source.can_refresh()
    }

    /// Get a token for API calls, from cache while it is still valid
    pub async fn get_token(&self) -> Result<Option<String>> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self.source.token().await?;
        let expires_at = Instant::now() + self.ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            self.ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token)
    }

    /// Drop the cached token and fetch a fresh one
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}
