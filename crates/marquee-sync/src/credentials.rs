//! # Credential Refresher
//!
//! Keeps the API token fresh: refreshes once more than half of the token's
//! lifetime has elapsed, and collapses concurrent refresh requests into one.
//!
//! ## Refresh Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  background tick (check_interval)                                       │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ensure_fresh()                                                         │
//! │     │  fraction = (now - iat) / (exp - iat)                             │
//! │     │  fraction ≤ 0.5 ──► nothing to do                                 │
//! │     ▼                                                                   │
//! │  refresh() ──┬── in flight? ──► await the SAME shared future            │
//! │              └── idle ──► POST refresh_path { refresh_token }           │
//! │                              ◄── { token, refresh_token }               │
//! │                              iat/exp read from the new JWT              │
//! │                              TokenStore updated                         │
//! │                                                                         │
//! │  Failures surface to the caller; the next tick is the retry.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A 401 from the content API is not handled here: the client raises an
//! `AuthSignal` and a full reauthentication happens outside the core.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::token_store::TokenStore;

/// Refresh once this fraction of the token lifetime has elapsed.
pub const REFRESH_THRESHOLD: f64 = 0.5;

type RefreshFuture = Shared<BoxFuture<'static, SyncResult<()>>>;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
    refresh_token: String,
}

/// Registered claims the refresher reads. The signature is not checked: the
/// player only needs the token's timing.
#[derive(Debug, Deserialize)]
pub(crate) struct TimingClaims {
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

// =============================================================================
// Credential Refresher
// =============================================================================

/// Cheap-to-clone handle; all clones share one in-flight slot.
#[derive(Clone)]
pub struct CredentialRefresher {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: Url,
    store: Arc<dyn TokenStore>,
    in_flight: Mutex<Option<RefreshFuture>>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl CredentialRefresher {
    pub fn new(http: reqwest::Client, refresh_url: Url, store: Arc<dyn TokenStore>) -> Self {
        CredentialRefresher {
            inner: Arc::new(Inner {
                http,
                refresh_url,
                store,
                in_flight: Mutex::new(None),
                background: Mutex::new(None),
            }),
        }
    }

    /// Refreshes if more than half of the token lifetime has elapsed.
    /// Returns whether a refresh happened.
    pub async fn ensure_fresh(&self) -> SyncResult<bool> {
        self.ensure_fresh_at(Utc::now()).await
    }

    pub async fn ensure_fresh_at(&self, now: DateTime<Utc>) -> SyncResult<bool> {
        let state = self.inner.store.load()?;
        let issued_at = state
            .issued_at
            .ok_or_else(|| SyncError::MissingCredentials("issued_at".into()))?;
        let expires_at = state
            .expires_at
            .ok_or_else(|| SyncError::MissingCredentials("expires_at".into()))?;
        if state.refresh_token.is_none() {
            return Err(SyncError::MissingCredentials("refresh_token".into()));
        }

        let fraction = elapsed_fraction(issued_at, expires_at, now);
        if fraction <= REFRESH_THRESHOLD {
            debug!(elapsed_fraction = fraction, "Token still fresh");
            return Ok(false);
        }

        debug!(elapsed_fraction = fraction, "Token past half-life");
        self.refresh().await?;
        Ok(true)
    }

    /// Exchanges the refresh token for a new token pair.
    ///
    /// Callers arriving while a refresh is in flight await the same request
    /// and receive the same outcome.
    pub async fn refresh(&self) -> SyncResult<()> {
        let pending = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .map_err(|_| SyncError::Internal("refresh slot poisoned".into()))?;

            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pending = async move {
                        let result = inner.request_refresh().await;
                        if let Ok(mut slot) = inner.in_flight.lock() {
                            *slot = None;
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Starts the periodic freshness check, replacing any running one.
    pub fn start_background(&self, interval: Duration) {
        let refresher = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match refresher.ensure_fresh().await {
                    Ok(true) => {}
                    Ok(false) => {}
                    Err(e) if e.is_auth_error() => {
                        warn!(error = %e, "Cannot check token freshness");
                    }
                    Err(e) => {
                        error!(error = %e, "Background token refresh failed");
                    }
                }
            }
        });

        if let Ok(mut background) = self.inner.background.lock() {
            if let Some(previous) = background.replace(task) {
                previous.abort();
            }
        }
        info!(interval_secs = interval.as_secs(), "Credential refresher started");
    }

    /// Stops the periodic check. An in-flight refresh is left to finish.
    pub fn stop(&self) {
        if let Ok(mut background) = self.inner.background.lock() {
            if let Some(task) = background.take() {
                task.abort();
                info!("Credential refresher stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .background
            .lock()
            .map(|b| b.as_ref().map_or(false, |t| !t.is_finished()))
            .unwrap_or(false)
    }
}

impl Inner {
    async fn request_refresh(&self) -> SyncResult<()> {
        let mut state = self.store.load()?;
        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or_else(|| SyncError::MissingCredentials("refresh_token".into()))?;

        info!(url = %self.refresh_url, "Refreshing API token");

        let response = self
            .http
            .post(self.refresh_url.clone())
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| SyncError::RefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Token refresh rejected");
            return Err(SyncError::RefreshFailed(format!("HTTP {status}: {body}")));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| SyncError::RefreshFailed(format!("invalid refresh response: {e}")))?;

        state.set_token(body.token)?;
        state.refresh_token = Some(body.refresh_token);
        self.store.store(&state)?;

        info!(expires_at = ?state.expires_at, "API token refreshed");
        Ok(())
    }
}

/// Fraction of the `[issued_at, expires_at]` lifetime elapsed at `now`.
/// A zero or negative lifetime counts as fully elapsed.
pub fn elapsed_fraction(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let lifetime = (expires_at - issued_at).num_milliseconds();
    if lifetime <= 0 {
        return 1.0;
    }
    (now - issued_at).num_milliseconds() as f64 / lifetime as f64
}

/// Reads `iat`/`exp` from a JWT without verifying its signature.
pub(crate) fn decode_timing(token: &str) -> SyncResult<TimingClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.algorithms = vec![
        Algorithm::HS256,
        Algorithm::HS384,
        Algorithm::HS512,
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::EdDSA,
    ];
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<TimingClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::{MemoryTokenStore, TokenState};
    use chrono::TimeZone;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn refresher(state: TokenState) -> CredentialRefresher {
        CredentialRefresher::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/v1/authentication/token/refresh").unwrap(),
            Arc::new(MemoryTokenStore::new(state)),
        )
    }

    #[test]
    fn test_elapsed_fraction() {
        assert_eq!(elapsed_fraction(at(0, 0), at(1, 0), at(0, 30)), 0.5);
        assert!(elapsed_fraction(at(0, 0), at(1, 0), at(0, 31)) > 0.5);
        assert_eq!(elapsed_fraction(at(1, 0), at(1, 0), at(0, 0)), 1.0);
    }

    #[test]
    fn test_decode_timing_ignores_signature() {
        let token = encode(
            &Header::default(),
            &json!({ "iat": 1_700_000_000, "exp": 1_700_003_600, "username": "screen" }),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap();

        let claims = decode_timing(&token).unwrap();
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_003_600);

        assert!(matches!(decode_timing("garbage"), Err(SyncError::TokenDecode(_))));
    }

    #[tokio::test]
    async fn test_ensure_fresh_requires_state() {
        let refresher = refresher(TokenState::default());
        let err = refresher.ensure_fresh_at(at(0, 10)).await.unwrap_err();
        assert_eq!(err, SyncError::MissingCredentials("issued_at".into()));

        let refresher = self::refresher(TokenState {
            issued_at: Some(at(0, 0)),
            expires_at: Some(at(1, 0)),
            ..Default::default()
        });
        let err = refresher.ensure_fresh_at(at(0, 10)).await.unwrap_err();
        assert_eq!(err, SyncError::MissingCredentials("refresh_token".into()));
    }

    #[tokio::test]
    async fn test_ensure_fresh_skips_young_token() {
        let refresher = refresher(TokenState {
            token: Some("t".into()),
            refresh_token: Some("r".into()),
            issued_at: Some(at(0, 0)),
            expires_at: Some(at(1, 0)),
            tenant_key: None,
        });
        // Would fail against the unreachable URL if it tried to refresh.
        assert!(!refresher.ensure_fresh_at(at(0, 20)).await.unwrap());
    }

    #[tokio::test]
    async fn test_background_start_stop() {
        let refresher = refresher(TokenState::default());
        refresher.start_background(Duration::from_secs(3600));
        assert!(refresher.is_running());
        refresher.stop();
        tokio::task::yield_now().await;
        assert!(!refresher.is_running());
    }
}
