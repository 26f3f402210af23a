//! # Resource Client
//!
//! Authenticated GET access to the content API.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  get("/v1/screens/S1")                                                 │
//! │     │                                                                   │
//! │     ├── base_url.join(path)            absolute URLs pass through      │
//! │     ├── Authorization: Bearer <token>  from the TokenStore             │
//! │     ├── Authorization-Tenant-Key       store value, else config        │
//! │     ▼                                                                   │
//! │  200 ──► JSON body                                                     │
//! │  401 ──► AuthRejected + AuthSignal::Rejected broadcast                 │
//! │  4xx/5xx ──► HttpStatus        network/timeout ──► FetchFailed         │
//! │                                                                         │
//! │  get_all_pages("/v1/playlists/P1/slides")                              │
//! │     page=1, page=2, ... while collected < hydra:totalItems             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::config::PlayerConfig;
use crate::error::{SyncError, SyncResult};
use crate::token_store::TokenStore;

/// Header carrying the tenant key.
pub const TENANT_KEY_HEADER: &str = "Authorization-Tenant-Key";

/// Safety stop for collections that never report a total.
const MAX_PAGES: u32 = 1000;

// =============================================================================
// Auth Signal
// =============================================================================

/// Published when the API rejects the player's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSignal {
    /// A request was answered with 401.
    Rejected { path: String },
}

// =============================================================================
// Resource Client Trait
// =============================================================================

/// Read access to API resources.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetches one resource.
    async fn get(&self, path: &str) -> SyncResult<Value>;

    /// Fetches every member of a paged collection.
    ///
    /// Requests `path?page=n` from 1 while the members collected so far are
    /// fewer than the reported `hydra:totalItems`, stopping early on an
    /// empty page.
    async fn get_all_pages(&self, path: &str) -> SyncResult<Vec<Value>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let body = self.get(&format!("{path}{separator}page={page}")).await?;

            let members = match body.get("hydra:member") {
                Some(Value::Array(members)) => members.clone(),
                Some(_) | None => Vec::new(),
            };
            if members.is_empty() {
                break;
            }
            items.extend(members);

            let total = body.get("hydra:totalItems").and_then(Value::as_u64);
            match total {
                Some(total) if (items.len() as u64) < total => continue,
                _ => break,
            }
        }

        debug!(path, count = items.len(), "Fetched collection");
        Ok(items)
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// `ResourceClient` over reqwest.
pub struct HttpResourceClient {
    http: reqwest::Client,
    base_url: Url,
    tenant_key: Option<String>,
    tokens: Arc<dyn TokenStore>,
    auth_tx: broadcast::Sender<AuthSignal>,
}

impl HttpResourceClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
    ) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;
        let (auth_tx, _) = broadcast::channel(16);

        Ok(HttpResourceClient {
            http,
            base_url: Url::parse(base_url)?,
            tenant_key: None,
            tokens,
            auth_tx,
        })
    }

    pub fn from_config(config: &PlayerConfig, tokens: Arc<dyn TokenStore>) -> SyncResult<Self> {
        let mut client = Self::new(&config.api.base_url, config.request_timeout(), tokens)?;
        client.tenant_key = config.api.tenant_key.clone();
        Ok(client)
    }

    /// Sets the tenant key used when the token store has none.
    pub fn with_tenant_key(mut self, key: impl Into<String>) -> Self {
        self.tenant_key = Some(key.into());
        self
    }

    /// Subscribes to authentication-rejected signals.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthSignal> {
        self.auth_tx.subscribe()
    }

    /// The underlying HTTP client, shared with the credential refresher.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an API path (or an absolute URL) against the base URL.
    pub fn url_for(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn get(&self, path: &str) -> SyncResult<Value> {
        let url = self.url_for(path)?;
        let state = self.tokens.load()?;

        let mut request = self.http.get(url).header(ACCEPT, "application/ld+json");
        if let Some(token) = state.token.as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(key) = state.tenant_key.as_deref().or(self.tenant_key.as_deref()) {
            request = request.header(TENANT_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::fetch(path, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "API rejected credentials");
            // No subscribers is fine.
            let _ = self.auth_tx.send(AuthSignal::Rejected {
                path: path.to_string(),
            });
            return Err(SyncError::AuthRejected {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SyncError::malformed(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::MemoryTokenStore;

    fn client() -> HttpResourceClient {
        HttpResourceClient::new(
            "https://display.example.com",
            Duration::from_secs(5),
            Arc::new(MemoryTokenStore::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_url_for_paths_and_absolute_urls() {
        let client = client();
        assert_eq!(
            client.url_for("/v1/screens/S1").unwrap().as_str(),
            "https://display.example.com/v1/screens/S1"
        );
        assert_eq!(
            client.url_for("https://feeds.example.org/rss").unwrap().as_str(),
            "https://feeds.example.org/rss"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpResourceClient::new(
            "not a url",
            Duration::from_secs(5),
            Arc::new(MemoryTokenStore::default()),
        );
        assert!(matches!(result, Err(SyncError::InvalidUrl(_))));
    }
}
