//! # marquee-sync: Content Sync & Playback Scheduling for Marquee
//!
//! This crate is the runtime half of the player core. It pulls the screen's
//! content tree from the content API, detects what changed, and drives a
//! per-region slide rotation for an external renderer.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Player Agent Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   PlayerAgent (Main Orchestrator)                │  │
//! │  │                                                                  │  │
//! │  │  Interval sync loop, cycles never overlap                        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  SyncEngine    │  │  ChangeGate    │  │  RegionScheduler       │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Checksum-aware │  │ SHA-256 of the │  │ ≤3-slide look-ahead    │    │
//! │  │ fetch of the   │  │ coarse tree;   │  │ per region, advanced   │    │
//! │  │ screen tree    │  │ full vs partial│  │ by "slide finished"    │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          ▼                                                              │
//! │  ┌────────────────┐  ┌────────────────────────┐                        │
//! │  │ResourceClient  │  │ CredentialRefresher    │                        │
//! │  │ Bearer GET,    │  │ Half-life refresh,     │                        │
//! │  │ hydra paging   │  │ one request in flight  │                        │
//! │  └────────────────┘  └────────────────────────┘                        │
//! │                                                                         │
//! │  RENDERER EVENTS:                                                      │
//! │  • ScreenChanged / RegionReady / RegionSlides / RegionRemoved          │
//! │  • ReauthenticationRequired / SyncFailed                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Main `PlayerAgent` orchestrator
//! - [`client`] - `ResourceClient` trait and its reqwest implementation
//! - [`config`] - Player configuration (API, intervals, token file)
//! - [`credentials`] - Token refresh coordinator
//! - [`engine`] - Incremental screen-tree sync
//! - [`error`] - Sync error types
//! - [`events`] - Renderer notifications
//! - [`gate`] - Change detection between cycles
//! - [`resources`] - API resource shapes
//! - [`scheduler`] - Region rotation actor
//! - [`token_store`] - Token persistence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use marquee_sync::{ChannelEmitter, MemoryTokenStore, PlayerAgent, PlayerConfig};
//!
//! let config = PlayerConfig::load_or_default(None);
//! let (emitter, mut events) = ChannelEmitter::new();
//! let agent = PlayerAgent::from_config(
//!     config,
//!     Arc::new(MemoryTokenStore::default()),
//!     Arc::new(emitter),
//! )?;
//! let handle = agent.start()?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod client;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod resources;
pub mod scheduler;
pub mod token_store;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{PlayerAgent, PlayerAgentBuilder, PlayerAgentHandle, PlayerStatus};
pub use client::{AuthSignal, HttpResourceClient, ResourceClient, TENANT_KEY_HEADER};
pub use config::PlayerConfig;
pub use credentials::{CredentialRefresher, REFRESH_THRESHOLD};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use events::{ChannelEmitter, NoOpEmitter, PlayerEvent, RendererEmitter};
pub use gate::{ChangeGate, GateDecision};
pub use scheduler::{RegionScheduler, SchedulerHandle};
pub use token_store::{JsonFileTokenStore, MemoryTokenStore, TokenState, TokenStore};
