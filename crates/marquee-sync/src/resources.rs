//! # API Resource Shapes
//!
//! Wire structs for the JSON-LD resources the content API serves, and their
//! projection onto the `marquee-core` content tree.
//!
//! ## Resource Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Screen ─┬─ layout ───────────► Layout { grid, regions[] }              │
//! │          ├─ regions[] ────────► /screens/{id}/regions/{rid}/playlists   │
//! │          │                        └─ [{ playlist }] ─► Playlist         │
//! │          ├─ campaigns ────────► [{ campaign }] ─► Playlist              │
//! │          └─ inScreenGroups ───► [ScreenGroup { campaigns }]             │
//! │                                                                         │
//! │  Playlist ── slides ──► [{ slide }] ─► Slide                            │
//! │  Slide ─┬─ templateInfo { @id } ─► template                             │
//! │         ├─ media[] ─────────────► media item                            │
//! │         ├─ feed { feedUrl } ────► feed data                             │
//! │         └─ theme ───────────────► theme                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every field is defaulted: the API omits empty relations freely and a
//! missing field must never fail a whole collection.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use marquee_core::{
    Grid, LayoutDescriptor, PlaylistDescriptor, PublishWindow, RegionPlacement, Schedule,
    ScreenChecksums, SlideChecksums, SlideDescriptor,
};

/// Collection items wrap the payload under these keys.
pub const CAMPAIGN_KEY: &str = "campaign";
pub const PLAYLIST_KEY: &str = "playlist";
pub const SLIDE_KEY: &str = "slide";

// =============================================================================
// Screen
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenResource {
    #[serde(rename = "@id")]
    pub id: String,
    pub title: String,
    pub layout: Option<String>,
    pub regions: Vec<String>,
    pub campaigns: Option<String>,
    pub in_screen_groups: Option<String>,
    pub relations_checksum: ScreenChecksums,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenGroupResource {
    #[serde(rename = "@id")]
    pub id: String,
    pub campaigns: Option<String>,
}

// =============================================================================
// Layout
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResource {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    pub grid: Grid,
    #[serde(default)]
    pub regions: Vec<LayoutRegionResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutRegionResource {
    #[serde(rename = "@id")]
    pub id: String,
    pub title: String,
    pub grid_area: Vec<String>,
}

impl LayoutResource {
    pub fn into_descriptor(self) -> LayoutDescriptor {
        LayoutDescriptor {
            id: self.id,
            grid: self.grid,
            regions: self
                .regions
                .into_iter()
                .map(|r| RegionPlacement {
                    id: last_segment(&r.id).to_string(),
                    title: r.title,
                    grid_area: r.grid_area,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Playlist
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistResource {
    #[serde(rename = "@id")]
    pub id: String,
    pub title: String,
    pub slides: Option<String>,
    pub published: PublishWindow,
    pub schedules: Vec<Schedule>,
    pub relations_checksum: PlaylistChecksums,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaylistChecksums {
    pub slides: Option<String>,
}

impl PlaylistResource {
    /// The playlist without its slides (those are fetched separately).
    pub fn into_descriptor(self) -> PlaylistDescriptor {
        PlaylistDescriptor {
            id: self.id,
            title: self.title,
            published: self.published,
            schedules: self.schedules,
            slides_path: self.slides.filter(|s| !s.is_empty()),
            slides_checksum: self.relations_checksum.slides,
            slides: Vec::new(),
        }
    }
}

// =============================================================================
// Slide
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlideResource {
    #[serde(rename = "@id")]
    pub id: String,
    pub title: String,
    pub template_info: Option<TemplateRef>,
    pub media: Vec<String>,
    pub feed: Option<FeedRef>,
    pub theme: Option<String>,
    pub published: PublishWindow,
    pub schedules: Vec<Schedule>,
    /// Milliseconds.
    pub duration: Option<u64>,
    pub content: Value,
    pub relations_checksum: SlideChecksums,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateRef {
    #[serde(rename = "@id")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedRef {
    pub feed_url: Option<String>,
}

impl SlideResource {
    /// The slide with references recorded but not yet resolved.
    pub fn into_descriptor(self) -> SlideDescriptor {
        SlideDescriptor {
            id: self.id,
            title: self.title,
            content: self.content,
            published: self.published,
            schedules: self.schedules,
            duration_ms: self.duration,
            template_id: self
                .template_info
                .and_then(|t| t.id)
                .filter(|id| !id.is_empty()),
            media_ids: self.media,
            feed_url: self
                .feed
                .and_then(|f| f.feed_url)
                .filter(|url| !url.is_empty()),
            theme_id: self.theme.filter(|t| !t.is_empty()),
            checksums: self.relations_checksum,
            template_data: None,
            media_data: BTreeMap::new(),
            feed_data: None,
            theme_data: None,
            invalid: false,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Pulls `key` out of every collection item, dropping items without it.
pub fn unwrap_items(items: Vec<Value>, key: &str) -> Vec<Value> {
    items
        .into_iter()
        .filter_map(|mut item| item.get_mut(key).map(Value::take))
        .filter(|v| !v.is_null())
        .collect()
}

/// Region id from a region playlists path such as
/// `/v1/screens/S1/regions/R1/playlists`.
pub fn region_id_from_path(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    segments.find(|s| *s == "regions")?;
    segments.next().filter(|s| !s.is_empty())
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_screen_resource_defaults() {
        let screen: ScreenResource = serde_json::from_value(json!({
            "@id": "/v1/screens/S1",
            "title": "Lobby",
            "layout": "/v1/layouts/L1",
            "regions": ["/v1/screens/S1/regions/R1/playlists"],
            "relationsChecksum": { "layout": "abc" }
        }))
        .unwrap();

        assert_eq!(screen.id, "/v1/screens/S1");
        assert_eq!(screen.relations_checksum.layout.as_deref(), Some("abc"));
        assert!(screen.relations_checksum.campaigns.is_none());
        assert!(screen.campaigns.is_none());
    }

    #[test]
    fn test_region_id_from_path() {
        assert_eq!(
            region_id_from_path("/v1/screens/S1/regions/R1/playlists"),
            Some("R1")
        );
        assert_eq!(region_id_from_path("/v1/screens/S1"), None);
        assert_eq!(region_id_from_path("/v1/screens/S1/regions/"), None);
    }

    #[test]
    fn test_layout_region_ids_are_last_segment() {
        let layout: LayoutResource = serde_json::from_value(json!({
            "@id": "/v1/layouts/L1",
            "grid": { "rows": 2, "columns": 1 },
            "regions": [
                { "@id": "/v1/layouts/regions/R1", "title": "Top", "gridArea": ["a"] },
                { "@id": "/v1/layouts/regions/R2", "title": "Bottom", "gridArea": ["b"] }
            ]
        }))
        .unwrap();

        let descriptor = layout.into_descriptor();
        assert_eq!(descriptor.grid, Grid { rows: 2, columns: 1 });
        assert_eq!(descriptor.regions[0].id, "R1");
        assert_eq!(descriptor.regions[1].grid_area, vec!["b".to_string()]);
    }

    #[test]
    fn test_slide_projection() {
        let slide: SlideResource = serde_json::from_value(json!({
            "@id": "/v1/slides/S1",
            "templateInfo": { "@id": "/v1/templates/T1" },
            "media": ["/v1/media/M1", "/v1/media/M2"],
            "feed": { "feedUrl": "/v1/feeds/F1/data" },
            "theme": "",
            "duration": 8000,
            "published": { "from": null, "to": null },
            "relationsChecksum": { "templateInfo": "t1", "media": "m1" }
        }))
        .unwrap();

        let descriptor = slide.into_descriptor();
        assert_eq!(descriptor.template_id.as_deref(), Some("/v1/templates/T1"));
        assert_eq!(descriptor.media_ids.len(), 2);
        assert_eq!(descriptor.feed_url.as_deref(), Some("/v1/feeds/F1/data"));
        assert!(descriptor.theme_id.is_none());
        assert_eq!(descriptor.duration_ms, Some(8000));
        assert_eq!(descriptor.checksums.template_info.as_deref(), Some("t1"));
    }

    #[test]
    fn test_unwrap_items_skips_missing() {
        let items = vec![
            json!({ "playlist": { "@id": "/v1/playlists/P1" } }),
            json!({ "weight": 1 }),
            json!({ "playlist": null }),
        ];
        let unwrapped = unwrap_items(items, PLAYLIST_KEY);
        assert_eq!(unwrapped.len(), 1);
        assert_eq!(unwrapped[0]["@id"], "/v1/playlists/P1");
    }
}
