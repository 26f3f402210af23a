//! # Content Tree Types
//!
//! The in-memory model the sync engine builds every cycle and the scheduler
//! rotates through.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Content Tree                                    │
//! │                                                                         │
//! │  ScreenTree ─┬─ LayoutDescriptor ── Grid, RegionPlacement[]            │
//! │              ├─ ScreenChecksums (campaigns, inScreenGroups, ...)       │
//! │              ├─ CampaignDescriptor[]  (all fetched, active or not)     │
//! │              └─ RegionContent[] ── PlaylistDescriptor[]                │
//! │                                       └─ SlideDescriptor[]             │
//! │                                            ├─ templateData             │
//! │                                            ├─ mediaData{id → data}     │
//! │                                            ├─ feedData / themeData     │
//! │                                            └─ invalid flag             │
//! │                                                                         │
//! │  Runtime only (never persisted):                                       │
//! │  ScheduledSlide = SlideDescriptor + executionId + resolved duration    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Trees are rebuilt every cycle and never mutated in place once emitted;
//! the previous tree is kept only so the next cycle can compare checksums.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

/// Region id used for the synthetic full-area region shown while a campaign
/// is active.
pub const CAMPAIGN_REGION_ID: &str = "campaign-region";

/// Slide duration used when a slide does not specify one (milliseconds).
pub const DEFAULT_SLIDE_DURATION_MS: u64 = 15_000;

// =============================================================================
// Publication
// =============================================================================

/// Absolute publication bounds. A missing bound is open-ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PublishWindow {
    /// Earliest instant the content may be shown.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,

    /// Latest instant the content may be shown.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl PublishWindow {
    /// A window with no bounds (always published).
    pub fn always() -> Self {
        Self::default()
    }

    /// A window bounded on both sides.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        PublishWindow {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// A recurring schedule: a recurrence rule plus how long each occurrence lasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Schedule {
    /// Rule text (`DTSTART:...` + `RRULE:...` lines).
    pub rrule: String,

    /// Length of each occurrence in seconds.
    pub duration: u64,
}

// =============================================================================
// Slides & Playlists
// =============================================================================

/// Server-supplied version markers for a slide's relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SlideChecksums {
    pub template_info: Option<String>,
    pub media: Option<String>,
    pub theme: Option<String>,
}

/// One slide with its references resolved by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SlideDescriptor {
    /// Resource id (`@id` path).
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Template-specific content payload.
    #[serde(default)]
    pub content: Value,

    #[serde(default)]
    pub published: PublishWindow,

    #[serde(default)]
    pub schedules: Vec<Schedule>,

    /// Slide duration in milliseconds, if the slide sets one.
    pub duration_ms: Option<u64>,

    /// Template resource path.
    pub template_id: Option<String>,

    /// Media resource paths, in slide order.
    #[serde(default)]
    pub media_ids: Vec<String>,

    pub feed_url: Option<String>,

    /// Theme resource path.
    pub theme_id: Option<String>,

    #[serde(default)]
    pub checksums: SlideChecksums,

    // -------------------------------------------------------------------------
    // Resolved during sync
    // -------------------------------------------------------------------------
    pub template_data: Option<Value>,

    /// Media id → resolved media. A failed fetch is recorded as `null`.
    #[serde(default)]
    pub media_data: BTreeMap<String, Value>,

    pub feed_data: Option<Value>,

    pub theme_data: Option<Value>,

    /// Set when the template could not be resolved; the slide stays in the
    /// tree but is never scheduled.
    #[serde(default)]
    pub invalid: bool,
}

impl SlideDescriptor {
    /// Creates an unresolved slide with open publication and no references.
    pub fn new(id: impl Into<String>) -> Self {
        SlideDescriptor {
            id: id.into(),
            title: String::new(),
            content: Value::Null,
            published: PublishWindow::always(),
            schedules: Vec::new(),
            duration_ms: None,
            template_id: None,
            media_ids: Vec::new(),
            feed_url: None,
            theme_id: None,
            checksums: SlideChecksums::default(),
            template_data: None,
            media_data: BTreeMap::new(),
            feed_data: None,
            theme_data: None,
            invalid: false,
        }
    }

    /// Duration to play this slide for, falling back to `default_ms`.
    pub fn effective_duration_ms(&self, default_ms: u64) -> u64 {
        match self.duration_ms {
            Some(ms) if ms > 0 => ms,
            _ => default_ms,
        }
    }
}

/// An ordered list of slides sharing a publication window and schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlaylistDescriptor {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub published: PublishWindow,

    #[serde(default)]
    pub schedules: Vec<Schedule>,

    /// Resource path of the playlist's slide collection.
    pub slides_path: Option<String>,

    /// Version marker for the slide relation.
    pub slides_checksum: Option<String>,

    #[serde(default)]
    pub slides: Vec<SlideDescriptor>,
}

impl PlaylistDescriptor {
    /// Creates an empty, always-published playlist.
    pub fn new(id: impl Into<String>) -> Self {
        PlaylistDescriptor {
            id: id.into(),
            title: String::new(),
            published: PublishWindow::always(),
            schedules: Vec::new(),
            slides_path: None,
            slides_checksum: None,
            slides: Vec::new(),
        }
    }
}

/// Where a campaign was attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum CampaignScope {
    /// Attached directly to the screen.
    Screen,
    /// Attached to a screen group the screen belongs to.
    ScreenGroup(String),
}

/// A time-bound playlist that overrides the screen's layout while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDescriptor {
    pub scope: CampaignScope,
    pub playlist: PlaylistDescriptor,
}

// =============================================================================
// Layout & Regions
// =============================================================================

/// Grid dimensions of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Grid {
    pub rows: u32,
    pub columns: u32,
}

/// A region's placement on the layout grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegionPlacement {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Grid cell names covered by the region.
    pub grid_area: Vec<String>,
}

/// Layout of a screen: a grid and the regions placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LayoutDescriptor {
    /// Resource id; `None` for the synthetic campaign layout.
    pub id: Option<String>,
    pub grid: Grid,
    pub regions: Vec<RegionPlacement>,
}

impl LayoutDescriptor {
    /// The fixed 1×1 layout with one full-area region used while a campaign
    /// is active.
    pub fn campaign() -> Self {
        LayoutDescriptor {
            id: None,
            grid: Grid { rows: 1, columns: 1 },
            regions: vec![RegionPlacement {
                id: CAMPAIGN_REGION_ID.to_string(),
                title: "Campaign".to_string(),
                grid_area: vec!["a".to_string()],
            }],
        }
    }
}

/// Per-region ordered playlists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionContent {
    pub region_id: String,
    pub playlists: Vec<PlaylistDescriptor>,
}

// =============================================================================
// Screen
// =============================================================================

/// Relation checksums reported by the screen resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenChecksums {
    pub campaigns: Option<String>,
    pub in_screen_groups: Option<String>,
    pub layout: Option<String>,
    pub regions: Option<String>,
}

/// The complete content tree for one physical display, as of one sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenTree {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Layout in effect; `None` if the layout could not be fetched.
    pub layout: Option<LayoutDescriptor>,

    pub checksums: ScreenChecksums,

    pub has_active_campaign: bool,

    /// Every campaign fetched for the screen and its groups, active or not.
    pub campaigns: Vec<CampaignDescriptor>,

    /// Region content in layout order.
    pub regions: Vec<RegionContent>,
}

impl ScreenTree {
    /// Looks up a region's content by id.
    pub fn region(&self, region_id: &str) -> Option<&RegionContent> {
        self.regions.iter().find(|r| r.region_id == region_id)
    }

    /// Projects the tree onto its coarse structure (no slide bodies).
    pub fn coarse(&self) -> CoarseScreen {
        CoarseScreen {
            id: self.id.clone(),
            title: self.title.clone(),
            layout: self.layout.clone(),
            region_ids: self.regions.iter().map(|r| r.region_id.clone()).collect(),
            has_active_campaign: self.has_active_campaign,
        }
    }
}

/// The screen structure with per-region content stripped; what the renderer
/// needs to lay regions out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CoarseScreen {
    pub id: String,
    pub title: String,
    pub layout: Option<LayoutDescriptor>,
    pub region_ids: Vec<String>,
    pub has_active_campaign: bool,
}

// =============================================================================
// Scheduled Slide
// =============================================================================

/// A slide instance queued for playback in a region.
///
/// Every instance gets a fresh execution id, so the renderer can tell two
/// plays of the same slide apart when it reports completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScheduledSlide {
    pub execution_id: String,
    pub region_id: String,
    pub duration_ms: u64,
    pub slide: SlideDescriptor,
}

impl ScheduledSlide {
    /// Projects `slide` into a new instance with a generated execution id.
    pub fn new(region_id: &str, slide: &SlideDescriptor, default_duration_ms: u64) -> Self {
        ScheduledSlide {
            execution_id: format!("EXE-{}", Uuid::new_v4()),
            region_id: region_id.to_string(),
            duration_ms: slide.effective_duration_ms(default_duration_ms),
            slide: slide.clone(),
        }
    }
}
