//! # Token Storage
//!
//! Persistent key-value state the credential refresher and the resource
//! client read and write.
//!
//! ## Stored State
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TokenState                                                             │
//! │  ├── token          Bearer token for every API request                  │
//! │  ├── refresh_token  Exchanged for a new token pair                      │
//! │  ├── issued_at      `iat` of the current token                          │
//! │  ├── expires_at     `exp` of the current token                          │
//! │  └── tenant_key     Sent as Authorization-Tenant-Key                    │
//! │                                                                         │
//! │  MemoryTokenStore    tests and ephemeral players                       │
//! │  JsonFileTokenStore  survives restarts (tokens.json)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The initial login that first fills the store is outside the player core.

use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::decode_timing;
use crate::error::{SyncError, SyncResult};

/// Everything the player keeps about its API credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tenant_key: Option<String>,
}

impl TokenState {
    /// State for an existing token, with `issued_at`/`expires_at` read from
    /// its claims so the refresher can tell its age.
    pub fn from_jwt(token: impl Into<String>, refresh_token: Option<String>) -> SyncResult<Self> {
        let mut state = TokenState {
            refresh_token,
            ..Default::default()
        };
        state.set_token(token.into())?;
        Ok(state)
    }

    /// Replaces the bearer token and its lifetime.
    pub fn set_token(&mut self, token: String) -> SyncResult<()> {
        let claims = decode_timing(&token)?;
        self.issued_at = DateTime::from_timestamp(claims.iat, 0);
        self.expires_at = DateTime::from_timestamp(claims.exp, 0);
        self.token = Some(token);
        Ok(())
    }
}

/// Storage backend for [`TokenState`].
pub trait TokenStore: Send + Sync {
    /// Reads the current state. An empty store yields `TokenState::default()`.
    fn load(&self) -> SyncResult<TokenState>;

    /// Replaces the stored state.
    fn store(&self, state: &TokenState) -> SyncResult<()>;

    /// Forgets all credentials.
    fn clear(&self) -> SyncResult<()>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Keeps token state in process memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    state: RwLock<TokenState>,
}

impl MemoryTokenStore {
    pub fn new(state: TokenState) -> Self {
        MemoryTokenStore {
            state: RwLock::new(state),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> SyncResult<TokenState> {
        self.state
            .read()
            .map(|s| s.clone())
            .map_err(|_| SyncError::Storage("token state lock poisoned".into()))
    }

    fn store(&self, state: &TokenState) -> SyncResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| SyncError::Storage("token state lock poisoned".into()))?;
        *guard = state.clone();
        Ok(())
    }

    fn clear(&self) -> SyncResult<()> {
        self.store(&TokenState::default())
    }
}

// =============================================================================
// JSON File Store
// =============================================================================

/// Keeps token state in a JSON file, cached in memory after first read.
#[derive(Debug)]
pub struct JsonFileTokenStore {
    path: PathBuf,
    cache: RwLock<Option<TokenState>>,
}

impl JsonFileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileTokenStore {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    fn read_file(&self) -> SyncResult<TokenState> {
        if !self.path.exists() {
            return Ok(TokenState::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| SyncError::Storage(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| SyncError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

impl TokenStore for JsonFileTokenStore {
    fn load(&self) -> SyncResult<TokenState> {
        if let Ok(guard) = self.cache.read() {
            if let Some(state) = guard.as_ref() {
                return Ok(state.clone());
            }
        }

        let state = self.read_file()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(state.clone());
        }
        Ok(state)
    }

    fn store(&self, state: &TokenState) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Storage(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, contents).map_err(|e| SyncError::Storage(e.to_string()))?;

        let mut guard = self
            .cache
            .write()
            .map_err(|_| SyncError::Storage("token cache lock poisoned".into()))?;
        *guard = Some(state.clone());

        debug!(path = %self.path.display(), "Token state written");
        Ok(())
    }

    fn clear(&self) -> SyncResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| SyncError::Storage(e.to_string()))?;
        }
        let mut guard = self
            .cache
            .write()
            .map_err(|_| SyncError::Storage("token cache lock poisoned".into()))?;
        *guard = Some(TokenState::default());
        Ok(())
    }
}
