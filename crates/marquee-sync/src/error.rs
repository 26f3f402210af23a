//! # Sync Error Types
//!
//! Error types for sync, scheduling and credential operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Fetch       │  │     Credentials         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RootFetchFailed│  │  MissingCredentials     │ │
//! │  │  InvalidUrl     │  │  FetchFailed    │  │  RefreshFailed          │ │
//! │  │  ConfigLoad/Save│  │  HttpStatus     │  │  TokenDecode            │ │
//! │  │                 │  │  AuthRejected   │  │                         │ │
//! │  │                 │  │  Malformed      │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │    Storage      │  │     Internal                                │  │
//! │  │                 │  │                                             │  │
//! │  │  Storage        │  │  ChannelError, Internal                     │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery Policy
//! - `RootFetchFailed` aborts one cycle; the previous tree stays in place.
//! - `FetchFailed` / `HttpStatus` on a nested resource null out that reference.
//! - `AuthRejected` is surfaced to the renderer for reauthentication.
//! - `RefreshFailed` is retried by the background refresh cadence only.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all sync, scheduling and credential failures.
///
/// Every payload is a string, so the type is `Clone` and one outcome can be
/// handed to several waiters (see the refresh collapse in `credentials`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid player configuration.
    #[error("Invalid player configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Fetch Errors
    // =========================================================================
    /// The screen resource itself could not be fetched; the cycle is aborted.
    #[error("Screen fetch failed for {path}: {reason}")]
    RootFetchFailed { path: String, reason: String },

    /// Network or decode failure on a resource.
    #[error("Fetch failed for {path}: {reason}")]
    FetchFailed { path: String, reason: String },

    /// The API answered with a non-success status.
    #[error("Unexpected HTTP status {status} for {path}")]
    HttpStatus { path: String, status: u16 },

    /// The API rejected the credentials (HTTP 401).
    #[error("Authentication rejected for {path}")]
    AuthRejected { path: String },

    /// A resource was fetched but lacks something the player needs.
    #[error("Malformed resource {path}: {reason}")]
    MalformedResource { path: String, reason: String },

    // =========================================================================
    // Credential Errors
    // =========================================================================
    /// A required piece of token state is absent.
    #[error("Missing credential state: {0}")]
    MissingCredentials(String),

    /// The refresh request failed.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A token could not be decoded.
    #[error("Token decode failed: {0}")]
    TokenDecode(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Token store read/write failed.
    #[error("Token storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal player error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Internal(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SyncError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SyncError::TokenDecode(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the next cycle (or next refresh tick) may succeed
    /// without outside intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RootFetchFailed { .. }
                | SyncError::FetchFailed { .. }
                | SyncError::RefreshFailed(_)
        ) || matches!(self, SyncError::HttpStatus { status, .. } if *status >= 500)
    }

    /// Returns true if this error calls for reauthentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SyncError::AuthRejected { .. } | SyncError::MissingCredentials(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    pub(crate) fn fetch(path: &str, reason: impl ToString) -> Self {
        SyncError::FetchFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl ToString) -> Self {
        SyncError::MalformedResource {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
