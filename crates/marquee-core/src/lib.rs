//! # marquee-core: Pure Content Logic for the Marquee Player
//!
//! The content model and every time-dependent rule of the player, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Marquee Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Renderer (external)                          │   │
//! │  │    ScreenChanged ──► region layout ──► slide templates          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ PlayerEvent / slide_done               │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    marquee-sync (runtime)                       │   │
//! │  │    SyncEngine, ChangeGate, RegionScheduler, credentials         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ marquee-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │ publication │  │ recurrence │  │ rotation │  │   │
//! │  │   │ScreenTree │  │ is_published│  │   RRULE    │  │  buffer  │  │   │
//! │  │   │  Slide    │  │ occurs_at   │  │ evaluation │  │  cursor  │  │   │
//! │  │   └───────────┘  └─────────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO NETWORK • "NOW" IS A PARAMETER        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Content tree (screen, regions, playlists, slides)
//! - [`publication`] - Publish window and recurring schedule predicates
//! - [`recurrence`] - RRULE parsing and evaluation
//! - [`rotation`] - Per-region rotation state machine
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use marquee_core::publication::occurs_at;
//! use marquee_core::Schedule;
//!
//! let lunch = Schedule {
//!     rrule: "DTSTART:20240101T120000Z\nRRULE:FREQ=DAILY".to_string(),
//!     duration: 3600,
//! };
//! let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 30, 0).unwrap();
//! assert!(occurs_at(&lunch, &now));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod publication;
pub mod recurrence;
pub mod rotation;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{RecurrenceError, RecurrenceResult};
pub use recurrence::RecurrenceRule;
pub use rotation::{RegionRotation, RotationChange, RotationState, ROTATION_BUFFER_SIZE};
pub use types::*;
