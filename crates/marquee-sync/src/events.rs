//! # Player Events
//!
//! Notifications from the player core to the renderer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ScreenChanged(coarse)       layout / region set changed               │
//! │  RegionReady { region }      rotation started in a region              │
//! │  RegionSlides { region, … }  new look-ahead queue (head = on screen)   │
//! │  RegionRemoved { region }    region left the layout                    │
//! │  ReauthenticationRequired    API answered 401                          │
//! │  SyncFailed { message }      a cycle failed; last content stays        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use marquee_core::{CoarseScreen, ScheduledSlide};

/// Event delivered to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    ScreenChanged(CoarseScreen),

    #[serde(rename_all = "camelCase")]
    RegionReady { region_id: String },

    #[serde(rename_all = "camelCase")]
    RegionSlides {
        region_id: String,
        slides: Vec<ScheduledSlide>,
    },

    #[serde(rename_all = "camelCase")]
    RegionRemoved { region_id: String },

    ReauthenticationRequired,

    SyncFailed { message: String },
}

// =============================================================================
// Emitter Trait
// =============================================================================

/// Sink for player events (implemented by the renderer integration).
pub trait RendererEmitter: Send + Sync {
    fn emit(&self, event: PlayerEvent);
}

/// Drops every event. Useful in tests.
pub struct NoOpEmitter;

impl RendererEmitter for NoOpEmitter {
    fn emit(&self, _event: PlayerEvent) {}
}

/// Forwards events into an unbounded channel.
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelEmitter { tx }, rx)
    }
}

impl RendererEmitter for ChannelEmitter {
    fn emit(&self, event: PlayerEvent) {
        if self.tx.send(event).is_err() {
            debug!("Renderer channel closed, dropping event");
        }
    }
}
