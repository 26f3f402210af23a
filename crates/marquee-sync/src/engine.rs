//! # Sync Engine
//!
//! Builds one [`ScreenTree`] per cycle from the content API, re-fetching
//! only what the server's relation checksums say has changed.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           run_cycle(entry)                              │
//! │                                                                         │
//! │  1. GET screen ─── fails? ──► RootFetchFailed, previous tree stays      │
//! │        │                                                                │
//! │  2. campaigns ─── {campaigns, inScreenGroups} unchanged? reuse          │
//! │        │          else screen campaigns + every group's campaigns       │
//! │        │          (groups fetched concurrently, failures → empty)       │
//! │        │                                                                │
//! │  3. any campaign schedulable now?                                       │
//! │        ├── yes ──► 1×1 layout, one region with the active campaigns     │
//! │        └── no  ──► layout   (reuse if checksum same, no transition)     │
//! │                    regions  (reuse if checksum same, no transition)     │
//! │        │                                                                │
//! │  4. every playlist: slides (reuse if slides checksum same)              │
//! │     every slide:    template ─┐                                         │
//! │                     media[]  ─┼─ checksum reuse, else in-cycle cache    │
//! │                     theme    ─┘                                         │
//! │                     feed     ── always fetched                          │
//! │                     no template ──► invalid (kept, never scheduled)     │
//! │        │                                                                │
//! │  5. new tree replaces the previous one                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A checksum only counts as unchanged when both cycles report one and they
//! match; a server that sends none gets everything re-fetched. A collection
//! whose fetch failed is never reused, whatever its checksum says, so one
//! dropped request cannot pin an empty region or playlist.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use marquee_core::publication::playlist_schedulable_at;
use marquee_core::{
    CampaignDescriptor, CampaignScope, LayoutDescriptor, PlaylistDescriptor, RegionContent,
    ScreenTree, SlideDescriptor, CAMPAIGN_REGION_ID,
};

use crate::client::ResourceClient;
use crate::error::{SyncError, SyncResult};
use crate::resources::{
    region_id_from_path, unwrap_items, LayoutResource, PlaylistResource, ScreenGroupResource,
    ScreenResource, SlideResource, CAMPAIGN_KEY, PLAYLIST_KEY, SLIDE_KEY,
};

// =============================================================================
// Sync Engine
// =============================================================================

/// Incremental fetch/diff engine. Owns the previous cycle's tree.
pub struct SyncEngine {
    client: Arc<dyn ResourceClient>,
    previous: Option<Arc<ScreenTree>>,
    failed: FailedRelations,
}

/// Collections in the previous tree that came back incomplete.
#[derive(Debug, Default)]
struct FailedRelations {
    campaigns: bool,
    regions: bool,
    /// Playlist ids whose slides could not be fetched.
    playlist_slides: HashSet<String>,
}

/// Per-cycle caches keyed by resource path. `None` records a failed fetch
/// so it is not retried within the same cycle.
#[derive(Default)]
struct CycleCache {
    templates: HashMap<String, Option<Value>>,
    media: HashMap<String, Option<Value>>,
    themes: HashMap<String, Option<Value>>,
}

/// Lookups into the previous tree.
struct PreviousIndex<'a> {
    playlists: HashMap<&'a str, &'a PlaylistDescriptor>,
    slides: HashMap<&'a str, &'a SlideDescriptor>,
}

impl<'a> PreviousIndex<'a> {
    fn build(tree: Option<&'a ScreenTree>) -> Self {
        let mut playlists = HashMap::new();
        let mut slides = HashMap::new();
        for region in tree.iter().flat_map(|t| t.regions.iter()) {
            for playlist in &region.playlists {
                playlists.insert(playlist.id.as_str(), playlist);
                for slide in &playlist.slides {
                    slides.insert(slide.id.as_str(), slide);
                }
            }
        }
        PreviousIndex { playlists, slides }
    }
}

impl SyncEngine {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        SyncEngine {
            client,
            previous: None,
            failed: FailedRelations::default(),
        }
    }

    /// The last successfully built tree.
    pub fn previous(&self) -> Option<&Arc<ScreenTree>> {
        self.previous.as_ref()
    }

    /// Runs one cycle against the local clock.
    pub async fn run_cycle(&mut self, entry: &str) -> SyncResult<Arc<ScreenTree>> {
        self.run_cycle_at(entry, Local::now().fixed_offset()).await
    }

    /// Runs one cycle with an explicit "now" for campaign evaluation.
    pub async fn run_cycle_at(
        &mut self,
        entry: &str,
        now: DateTime<FixedOffset>,
    ) -> SyncResult<Arc<ScreenTree>> {
        let screen = self.fetch_screen(entry).await?;
        let previous = self.previous.clone();
        let prev = previous.as_deref();
        let checksums = screen.relations_checksum.clone();
        let mut failed = FailedRelations::default();

        // ---------------------------------------------------------------------
        // Campaigns
        // ---------------------------------------------------------------------
        let campaigns = match prev {
            Some(p)
                if !self.failed.campaigns
                    && same(&p.checksums.campaigns, &checksums.campaigns)
                    && same(&p.checksums.in_screen_groups, &checksums.in_screen_groups) =>
            {
                debug!(screen_id = %screen.id, "Campaign checksums unchanged, reusing");
                p.campaigns.clone()
            }
            _ => {
                let (campaigns, complete) = self.fetch_campaigns(&screen).await;
                failed.campaigns = !complete;
                campaigns
            }
        };

        let active: Vec<PlaylistDescriptor> = campaigns
            .iter()
            .filter(|c| playlist_schedulable_at(&c.playlist, &now))
            .map(|c| c.playlist.clone())
            .collect();
        let has_active_campaign = !active.is_empty();

        let transition = prev.map_or(false, |p| p.has_active_campaign != has_active_campaign);
        if transition {
            info!(
                screen_id = %screen.id,
                active = has_active_campaign,
                "Campaign transition, re-resolving layout and regions"
            );
        }
        // The previous layout and regions are only meaningful if they came from
        // the screen's own layout.
        let prev_layout_tree = prev.filter(|p| !transition && !p.has_active_campaign);

        // ---------------------------------------------------------------------
        // Layout & region playlists
        // ---------------------------------------------------------------------
        let (layout, region_playlists) = if has_active_campaign {
            let layout = LayoutDescriptor::campaign();
            (Some(layout), vec![(CAMPAIGN_REGION_ID.to_string(), active)])
        } else {
            let layout = match prev_layout_tree {
                Some(p) if same(&p.checksums.layout, &checksums.layout) && p.layout.is_some() => {
                    debug!(screen_id = %screen.id, "Layout checksum unchanged, reusing");
                    p.layout.clone()
                }
                _ => self.fetch_layout(&screen).await,
            };

            let regions = match prev_layout_tree {
                Some(p) if !self.failed.regions && same(&p.checksums.regions, &checksums.regions) => {
                    debug!(screen_id = %screen.id, "Regions checksum unchanged, reusing");
                    p.regions
                        .iter()
                        .map(|r| (r.region_id.clone(), r.playlists.clone()))
                        .collect()
                }
                _ => {
                    let (regions, complete) = self.fetch_region_playlists(&screen).await;
                    failed.regions = !complete;
                    regions
                }
            };
            (layout, regions)
        };

        // ---------------------------------------------------------------------
        // Slides and their references
        // ---------------------------------------------------------------------
        let index = PreviousIndex::build(prev);
        let mut cache = CycleCache::default();
        let mut regions = Vec::with_capacity(region_playlists.len());

        for (region_id, playlists) in region_playlists {
            let mut resolved = Vec::with_capacity(playlists.len());
            for playlist in playlists {
                resolved.push(
                    self.resolve_playlist(playlist, &index, &mut cache, &mut failed)
                        .await,
                );
            }
            regions.push(RegionContent {
                region_id,
                playlists: resolved,
            });
        }

        let tree = Arc::new(ScreenTree {
            id: screen.id,
            title: screen.title,
            layout,
            checksums,
            has_active_campaign,
            campaigns,
            regions,
        });

        debug!(
            screen_id = %tree.id,
            regions = tree.regions.len(),
            templates_fetched = cache.templates.len(),
            media_fetched = cache.media.len(),
            incomplete_playlists = failed.playlist_slides.len(),
            "Sync cycle complete"
        );

        self.previous = Some(Arc::clone(&tree));
        self.failed = failed;
        Ok(tree)
    }

    // =========================================================================
    // Screen
    // =========================================================================

    async fn fetch_screen(&self, entry: &str) -> SyncResult<ScreenResource> {
        let root_failure = |reason: String| SyncError::RootFetchFailed {
            path: entry.to_string(),
            reason,
        };

        let value = self
            .client
            .get(entry)
            .await
            .map_err(|e| root_failure(e.to_string()))?;
        let has_id = value
            .get("@id")
            .and_then(Value::as_str)
            .map_or(false, |id| !id.is_empty());
        if !has_id {
            return Err(root_failure("empty screen resource".into()));
        }
        serde_json::from_value(value).map_err(|e| root_failure(e.to_string()))
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    /// Screen campaigns followed by every group's campaigns. The flag is
    /// false when any of the collections could not be fetched.
    async fn fetch_campaigns(&self, screen: &ScreenResource) -> (Vec<CampaignDescriptor>, bool) {
        let mut campaigns = Vec::new();
        let mut complete = true;

        if let Some(path) = screen.campaigns.as_deref() {
            match self.client.get_all_pages(path).await {
                Ok(items) => campaigns.extend(
                    parse_items::<PlaylistResource>(path, unwrap_items(items, CAMPAIGN_KEY))
                        .into_iter()
                        .map(|p| CampaignDescriptor {
                            scope: CampaignScope::Screen,
                            playlist: p.into_descriptor(),
                        }),
                ),
                Err(e) => {
                    warn!(path, error = %e, "Screen campaigns unavailable");
                    complete = false;
                }
            }
        }

        let Some(groups_path) = screen.in_screen_groups.as_deref() else {
            return (campaigns, complete);
        };
        let groups = match self.client.get_all_pages(groups_path).await {
            Ok(items) => parse_items::<ScreenGroupResource>(groups_path, items),
            Err(e) => {
                warn!(path = groups_path, error = %e, "Screen groups unavailable");
                complete = false;
                Vec::new()
            }
        };

        let fetches = groups.into_iter().filter_map(|group| {
            let path = group.campaigns?;
            let client = Arc::clone(&self.client);
            Some(async move {
                let result = client.get_all_pages(&path).await;
                (group.id, path, result)
            })
        });

        for (group_id, path, result) in join_all(fetches).await {
            match result {
                Ok(items) => campaigns.extend(
                    parse_items::<PlaylistResource>(&path, unwrap_items(items, CAMPAIGN_KEY))
                        .into_iter()
                        .map(|p| CampaignDescriptor {
                            scope: CampaignScope::ScreenGroup(group_id.clone()),
                            playlist: p.into_descriptor(),
                        }),
                ),
                Err(e) => {
                    warn!(path = %path, error = %e, "Screen group campaigns unavailable");
                    complete = false;
                }
            }
        }

        debug!(screen_id = %screen.id, count = campaigns.len(), complete, "Campaigns fetched");
        (campaigns, complete)
    }

    // =========================================================================
    // Layout & Regions
    // =========================================================================

    async fn fetch_layout(&self, screen: &ScreenResource) -> Option<LayoutDescriptor> {
        let Some(path) = screen.layout.as_deref() else {
            warn!(screen_id = %screen.id, "Screen has no layout");
            return None;
        };
        match self.fetch_as::<LayoutResource>(path).await {
            Ok(layout) => Some(layout.into_descriptor()),
            Err(e) => {
                warn!(path, error = %e, "Layout unavailable");
                None
            }
        }
    }

    /// Every region's playlists, fetched concurrently. A failed region comes
    /// back empty and clears the completeness flag.
    async fn fetch_region_playlists(
        &self,
        screen: &ScreenResource,
    ) -> (Vec<(String, Vec<PlaylistDescriptor>)>, bool) {
        let fetches = screen.regions.iter().filter_map(|path| {
            let Some(region_id) = region_id_from_path(path) else {
                warn!(path = %path, "Cannot derive region id from path");
                return None;
            };
            let region_id = region_id.to_string();
            let client = Arc::clone(&self.client);
            Some(async move {
                match client.get_all_pages(path).await {
                    Ok(items) => {
                        let playlists: Vec<PlaylistDescriptor> =
                            parse_items::<PlaylistResource>(path, unwrap_items(items, PLAYLIST_KEY))
                                .into_iter()
                                .map(PlaylistResource::into_descriptor)
                                .collect();
                        (region_id, playlists, true)
                    }
                    Err(e) => {
                        warn!(path = %path, error = %e, "Region playlists unavailable");
                        (region_id, Vec::new(), false)
                    }
                }
            })
        });

        let mut complete = true;
        let regions: Vec<(String, Vec<PlaylistDescriptor>)> = join_all(fetches)
            .await
            .into_iter()
            .map(|(region_id, playlists, ok)| {
                complete &= ok;
                (region_id, playlists)
            })
            .collect();
        (regions, complete)
    }

    // =========================================================================
    // Playlists & Slides
    // =========================================================================

    async fn resolve_playlist(
        &self,
        mut playlist: PlaylistDescriptor,
        index: &PreviousIndex<'_>,
        cache: &mut CycleCache,
        failed: &mut FailedRelations,
    ) -> PlaylistDescriptor {
        let reusable = index
            .playlists
            .get(playlist.id.as_str())
            .filter(|_| !self.failed.playlist_slides.contains(&playlist.id))
            .filter(|prev| same(&prev.slides_checksum, &playlist.slides_checksum));

        let slides = match reusable {
            Some(prev) => {
                debug!(playlist_id = %playlist.id, "Slides checksum unchanged, reusing");
                prev.slides.clone()
            }
            None => match self.fetch_slides(&playlist).await {
                Some(slides) => slides,
                None => {
                    failed.playlist_slides.insert(playlist.id.clone());
                    Vec::new()
                }
            },
        };

        let mut resolved = Vec::with_capacity(slides.len());
        for slide in slides {
            let previous = index.slides.get(slide.id.as_str()).copied();
            resolved.push(self.resolve_slide(slide, previous, cache).await);
        }
        playlist.slides = resolved;
        playlist
    }

    /// `None` when the slide collection could not be fetched.
    async fn fetch_slides(&self, playlist: &PlaylistDescriptor) -> Option<Vec<SlideDescriptor>> {
        let Some(path) = playlist.slides_path.as_deref() else {
            return Some(Vec::new());
        };
        match self.client.get_all_pages(path).await {
            Ok(items) => Some(
                parse_items::<SlideResource>(path, unwrap_items(items, SLIDE_KEY))
                    .into_iter()
                    .map(SlideResource::into_descriptor)
                    .collect(),
            ),
            Err(e) => {
                warn!(path, error = %e, "Playlist slides unavailable");
                None
            }
        }
    }

    async fn resolve_slide(
        &self,
        mut slide: SlideDescriptor,
        previous: Option<&SlideDescriptor>,
        cache: &mut CycleCache,
    ) -> SlideDescriptor {
        // Template
        slide.template_data = match slide.template_id.clone() {
            Some(template_id) => {
                let reused = previous
                    .filter(|p| {
                        p.template_id == slide.template_id
                            && same(&p.checksums.template_info, &slide.checksums.template_info)
                    })
                    .and_then(|p| p.template_data.clone());
                match reused {
                    Some(data) => {
                        cache
                            .templates
                            .entry(template_id)
                            .or_insert_with(|| Some(data.clone()));
                        Some(data)
                    }
                    None => self.cached(&mut cache.templates, &template_id).await,
                }
            }
            None => {
                let err = SyncError::malformed(&slide.id, "no template reference");
                warn!(slide_id = %slide.id, error = %err, "Slide cannot be rendered");
                None
            }
        };
        slide.invalid = slide.template_data.is_none();
        if slide.invalid && slide.template_id.is_some() {
            warn!(slide_id = %slide.id, "Template unavailable, slide marked invalid");
        }

        // Media
        let media_unchanged = previous.map_or(false, |p| same(&p.checksums.media, &slide.checksums.media));
        let mut media_data = BTreeMap::new();
        for media_id in &slide.media_ids {
            let reused = previous
                .filter(|_| media_unchanged)
                .and_then(|p| p.media_data.get(media_id))
                .filter(|v| !v.is_null())
                .cloned();
            let value = match reused {
                Some(value) => Some(value),
                None => self.cached(&mut cache.media, media_id).await,
            };
            media_data.insert(media_id.clone(), value.unwrap_or(Value::Null));
        }
        slide.media_data = media_data;

        // Theme
        slide.theme_data = match slide.theme_id.clone() {
            Some(theme_id) => {
                let reused = previous
                    .filter(|p| {
                        p.theme_id == slide.theme_id && same(&p.checksums.theme, &slide.checksums.theme)
                    })
                    .and_then(|p| p.theme_data.clone());
                match reused {
                    Some(data) => Some(data),
                    None => self.cached(&mut cache.themes, &theme_id).await,
                }
            }
            None => None,
        };

        // Feed
        slide.feed_data = match slide.feed_url.as_deref() {
            Some(url) => match self.client.get(url).await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(slide_id = %slide.id, url, error = %e, "Feed unavailable");
                    None
                }
            },
            None => None,
        };

        slide
    }

    // =========================================================================
    // Fetch Helpers
    // =========================================================================

    async fn cached(&self, cache: &mut HashMap<String, Option<Value>>, path: &str) -> Option<Value> {
        if let Some(hit) = cache.get(path) {
            debug!(path, "In-cycle cache hit");
            return hit.clone();
        }
        let value = match self.client.get(path).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path, error = %e, "Reference unavailable");
                None
            }
        };
        cache.insert(path.to_string(), value.clone());
        value
    }

    async fn fetch_as<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        let value = self.client.get(path).await?;
        serde_json::from_value(value).map_err(|e| SyncError::malformed(path, e))
    }
}

/// Checksums match only when both sides report one.
fn same(previous: &Option<String>, current: &Option<String>) -> bool {
    matches!((previous, current), (Some(a), Some(b)) if a == b)
}

fn parse_items<T: DeserializeOwned>(path: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(path, error = %e, "Skipping malformed collection item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use marquee_core::RegionRotation;
    use serde_json::json;
    use std::sync::Mutex;

    const SCREEN: &str = "/v1/screens/S1";
    const REGION_PATH: &str = "/v1/screens/S1/regions/R1/playlists";

    #[derive(Default)]
    struct FakeClient {
        resources: Mutex<HashMap<String, Value>>,
        collections: Mutex<HashMap<String, Vec<Value>>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl FakeClient {
        fn put(&self, path: &str, value: Value) {
            self.resources.lock().unwrap().insert(path.into(), value);
        }

        fn remove(&self, path: &str) {
            self.resources.lock().unwrap().remove(path);
        }

        fn put_collection(&self, path: &str, items: Vec<Value>) {
            self.collections.lock().unwrap().insert(path.into(), items);
        }

        fn calls(&self, path: &str) -> usize {
            self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
        }

        fn record(&self, path: &str) {
            *self.calls.lock().unwrap().entry(path.into()).or_default() += 1;
        }
    }

    #[async_trait]
    impl ResourceClient for FakeClient {
        async fn get(&self, path: &str) -> SyncResult<Value> {
            self.record(path);
            self.resources
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| SyncError::HttpStatus {
                    path: path.into(),
                    status: 404,
                })
        }

        async fn get_all_pages(&self, path: &str) -> SyncResult<Vec<Value>> {
            self.record(path);
            self.collections
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| SyncError::fetch(path, "connection refused"))
        }
    }

    fn now() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap().fixed_offset()
    }

    fn screen(campaigns_checksum: &str) -> Value {
        json!({
            "@id": SCREEN,
            "title": "Lobby",
            "layout": "/v1/layouts/L1",
            "regions": [REGION_PATH],
            "campaigns": "/v1/screens/S1/campaigns",
            "inScreenGroups": "/v1/screens/S1/screen-groups",
            "relationsChecksum": {
                "campaigns": campaigns_checksum,
                "inScreenGroups": "g1",
                "layout": "l1",
                "regions": "r1"
            }
        })
    }

    fn slide(id: &str, template: &str) -> Value {
        json!({
            "slide": {
                "@id": id,
                "templateInfo": { "@id": template },
                "media": ["/v1/media/M1"],
                "relationsChecksum": { "templateInfo": "t1", "media": "m1" }
            }
        })
    }

    /// A screen with one region, one playlist and two slides sharing a template.
    fn fixture() -> Arc<FakeClient> {
        let client = Arc::new(FakeClient::default());
        client.put(SCREEN, screen("c1"));
        client.put(
            "/v1/layouts/L1",
            json!({
                "@id": "/v1/layouts/L1",
                "grid": { "rows": 1, "columns": 1 },
                "regions": [{ "@id": "/v1/layouts/regions/R1", "gridArea": ["a"] }]
            }),
        );
        client.put_collection("/v1/screens/S1/campaigns", vec![]);
        client.put_collection("/v1/screens/S1/screen-groups", vec![]);
        client.put_collection(
            REGION_PATH,
            vec![json!({
                "playlist": {
                    "@id": "/v1/playlists/P1",
                    "slides": "/v1/playlists/P1/slides",
                    "relationsChecksum": { "slides": "s1" }
                }
            })],
        );
        client.put_collection(
            "/v1/playlists/P1/slides",
            vec![
                slide("/v1/slides/A", "/v1/templates/T1"),
                slide("/v1/slides/B", "/v1/templates/T1"),
            ],
        );
        client.put("/v1/templates/T1", json!({ "@id": "/v1/templates/T1", "resources": {} }));
        client.put("/v1/media/M1", json!({ "@id": "/v1/media/M1", "assets": {} }));
        client
    }

    fn active_campaign(id: &str) -> Value {
        json!({
            "campaign": {
                "@id": id,
                "slides": format!("{id}/slides"),
                "published": { "from": "2024-03-01T00:00:00Z", "to": "2024-04-01T00:00:00Z" }
            }
        })
    }

    #[tokio::test]
    async fn test_shared_template_fetched_once() {
        let client = fixture();
        let mut engine = SyncEngine::new(client.clone());

        let tree = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        assert_eq!(client.calls("/v1/templates/T1"), 1);
        assert_eq!(client.calls("/v1/media/M1"), 1);
        let slides = &tree.regions[0].playlists[0].slides;
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].template_data, slides[1].template_data);
        assert!(slides.iter().all(|s| !s.invalid));
        assert!(!tree.has_active_campaign);
        assert_eq!(tree.layout.as_ref().unwrap().regions[0].id, "R1");
    }

    #[tokio::test]
    async fn test_template_failure_marks_only_that_slide() {
        let client = fixture();
        client.put_collection(
            "/v1/playlists/P1/slides",
            vec![
                slide("/v1/slides/A", "/v1/templates/T1"),
                slide("/v1/slides/B", "/v1/templates/MISSING"),
            ],
        );
        let mut engine = SyncEngine::new(client.clone());
        let tree = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        let slides = &tree.regions[0].playlists[0].slides;
        assert!(!slides[0].invalid);
        assert!(slides[1].invalid);

        let mut rotation = RegionRotation::new("R1", 15_000);
        rotation.update(tree.regions[0].playlists.clone(), &now());
        let ids: Vec<_> = rotation.scheduled().into_iter().map(|s| s.slide.id).collect();
        assert_eq!(ids, vec!["/v1/slides/A".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_media_is_null() {
        let client = fixture();
        client.remove("/v1/media/M1");
        let mut engine = SyncEngine::new(client.clone());
        let tree = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        let slide = &tree.regions[0].playlists[0].slides[0];
        assert_eq!(slide.media_data.get("/v1/media/M1"), Some(&Value::Null));
        assert!(!slide.invalid);
        // The failure is remembered for the rest of the cycle.
        assert_eq!(client.calls("/v1/media/M1"), 1);
    }

    #[tokio::test]
    async fn test_root_failure_keeps_previous_tree() {
        let client = fixture();
        let mut engine = SyncEngine::new(client.clone());
        let first = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        client.remove(SCREEN);
        let err = engine.run_cycle_at(SCREEN, now()).await.unwrap_err();
        assert!(matches!(err, SyncError::RootFetchFailed { .. }));
        assert!(Arc::ptr_eq(engine.previous().unwrap(), &first));
    }

    #[tokio::test]
    async fn test_unchanged_checksums_skip_refetch() {
        let client = fixture();
        client.put_collection(
            "/v1/playlists/P1/slides",
            vec![json!({
                "slide": {
                    "@id": "/v1/slides/A",
                    "templateInfo": { "@id": "/v1/templates/T1" },
                    "feed": { "feedUrl": "/v1/feeds/F1/data" },
                    "relationsChecksum": { "templateInfo": "t1" }
                }
            })],
        );
        client.put("/v1/feeds/F1/data", json!([{ "title": "News" }]));
        let mut engine = SyncEngine::new(client.clone());

        engine.run_cycle_at(SCREEN, now()).await.unwrap();
        let second = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        assert_eq!(client.calls(SCREEN), 2);
        assert_eq!(client.calls("/v1/layouts/L1"), 1);
        assert_eq!(client.calls(REGION_PATH), 1);
        assert_eq!(client.calls("/v1/screens/S1/campaigns"), 1);
        assert_eq!(client.calls("/v1/playlists/P1/slides"), 1);
        assert_eq!(client.calls("/v1/templates/T1"), 1);
        // Feeds are always fresh.
        assert_eq!(client.calls("/v1/feeds/F1/data"), 2);
        assert!(second.regions[0].playlists[0].slides[0].feed_data.is_some());
    }

    #[tokio::test]
    async fn test_changed_template_checksum_refetches() {
        let client = fixture();
        let mut engine = SyncEngine::new(client.clone());
        engine.run_cycle_at(SCREEN, now()).await.unwrap();

        let mut changed = screen("c1");
        changed["relationsChecksum"]["regions"] = json!("r2");
        client.put(SCREEN, changed);
        client.put_collection(
            REGION_PATH,
            vec![json!({
                "playlist": {
                    "@id": "/v1/playlists/P1",
                    "slides": "/v1/playlists/P1/slides",
                    "relationsChecksum": { "slides": "s2" }
                }
            })],
        );
        let mut edited = slide("/v1/slides/A", "/v1/templates/T1");
        edited["slide"]["relationsChecksum"]["templateInfo"] = json!("t2");
        client.put_collection(
            "/v1/playlists/P1/slides",
            vec![edited, slide("/v1/slides/B", "/v1/templates/T1")],
        );

        engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls(REGION_PATH), 2);
        assert_eq!(client.calls("/v1/playlists/P1/slides"), 2);
        // Slide A refetches, slide B reuses its own data.
        assert_eq!(client.calls("/v1/templates/T1"), 2);
    }

    #[tokio::test]
    async fn test_active_campaign_replaces_layout() {
        let client = fixture();
        client.put_collection(
            "/v1/screens/S1/campaigns",
            vec![active_campaign("/v1/playlists/C1")],
        );
        client.put_collection(
            "/v1/playlists/C1/slides",
            vec![slide("/v1/slides/CA", "/v1/templates/T1")],
        );
        let mut engine = SyncEngine::new(client.clone());

        let tree = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        assert!(tree.has_active_campaign);
        assert_eq!(tree.layout, Some(LayoutDescriptor::campaign()));
        assert_eq!(tree.regions.len(), 1);
        assert_eq!(tree.regions[0].region_id, CAMPAIGN_REGION_ID);
        assert_eq!(tree.regions[0].playlists[0].slides[0].id, "/v1/slides/CA");
        assert_eq!(client.calls("/v1/layouts/L1"), 0);
        assert_eq!(client.calls(REGION_PATH), 0);
    }

    #[tokio::test]
    async fn test_campaign_end_forces_layout_refetch() {
        let client = fixture();
        let mut engine = SyncEngine::new(client.clone());
        engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls("/v1/layouts/L1"), 1);

        // Campaign starts.
        client.put(SCREEN, screen("c2"));
        client.put_collection(
            "/v1/screens/S1/campaigns",
            vec![active_campaign("/v1/playlists/C1")],
        );
        client.put_collection("/v1/playlists/C1/slides", vec![]);
        let during = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert!(during.has_active_campaign);

        // Campaign window closes without any checksum change.
        let later = now() + Duration::days(30);
        let after = engine.run_cycle_at(SCREEN, later).await.unwrap();
        assert!(!after.has_active_campaign);
        assert_eq!(after.campaigns.len(), 1);
        // Layout and regions checksums are unchanged, but the transition
        // forces a re-fetch.
        assert_eq!(client.calls("/v1/layouts/L1"), 2);
        assert_eq!(client.calls(REGION_PATH), 2);
    }

    #[tokio::test]
    async fn test_group_campaigns_are_added() {
        let client = fixture();
        client.put_collection(
            "/v1/screens/S1/screen-groups",
            vec![
                json!({ "@id": "/v1/screen-groups/G1", "campaigns": "/v1/screen-groups/G1/campaigns" }),
                json!({ "@id": "/v1/screen-groups/G2", "campaigns": "/v1/screen-groups/G2/campaigns" }),
            ],
        );
        client.put_collection(
            "/v1/screen-groups/G1/campaigns",
            vec![active_campaign("/v1/playlists/C1")],
        );
        // G2's campaigns are unreachable; G1's still count.
        client.put_collection(
            "/v1/screens/S1/campaigns",
            vec![active_campaign("/v1/playlists/C2")],
        );
        client.put_collection("/v1/playlists/C1/slides", vec![]);
        client.put_collection("/v1/playlists/C2/slides", vec![]);

        let mut engine = SyncEngine::new(client.clone());
        let tree = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        assert_eq!(tree.campaigns.len(), 2);
        assert!(tree
            .campaigns
            .iter()
            .any(|c| c.scope == CampaignScope::ScreenGroup("/v1/screen-groups/G1".into())));
        let ids: Vec<_> = tree.regions[0].playlists.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["/v1/playlists/C2", "/v1/playlists/C1"]);
    }

    #[tokio::test]
    async fn test_region_failure_yields_empty_region() {
        let client = fixture();
        client.collections.lock().unwrap().remove(REGION_PATH);
        let mut engine = SyncEngine::new(client.clone());

        let tree = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(tree.regions.len(), 1);
        assert!(tree.regions[0].playlists.is_empty());
    }

    #[tokio::test]
    async fn test_failed_region_is_refetched_next_cycle() {
        let client = fixture();
        let playlists = client.collections.lock().unwrap().remove(REGION_PATH).unwrap();
        let mut engine = SyncEngine::new(client.clone());

        let first = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert!(first.regions[0].playlists.is_empty());

        // Same checksums, but the empty region must not be reused.
        client.put_collection(REGION_PATH, playlists);
        let second = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls(REGION_PATH), 2);
        assert_eq!(second.regions[0].playlists.len(), 1);
        assert_eq!(second.regions[0].playlists[0].slides.len(), 2);

        // Once complete, the checksum is trusted again.
        engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls(REGION_PATH), 2);
    }

    #[tokio::test]
    async fn test_failed_slides_are_refetched_next_cycle() {
        let client = fixture();
        let slides_path = "/v1/playlists/P1/slides";
        let slides = client.collections.lock().unwrap().remove(slides_path).unwrap();
        let mut engine = SyncEngine::new(client.clone());

        let first = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert!(first.regions[0].playlists[0].slides.is_empty());

        client.put_collection(slides_path, slides);
        let second = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls(slides_path), 2);
        assert_eq!(second.regions[0].playlists[0].slides.len(), 2);
        // The region itself was complete and stays reused.
        assert_eq!(client.calls(REGION_PATH), 1);

        engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls(slides_path), 2);
    }

    #[tokio::test]
    async fn test_failed_campaigns_are_refetched_next_cycle() {
        let client = fixture();
        client
            .collections
            .lock()
            .unwrap()
            .remove("/v1/screens/S1/campaigns");
        client.put_collection("/v1/playlists/C1/slides", vec![]);
        let mut engine = SyncEngine::new(client.clone());

        let first = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert!(!first.has_active_campaign);

        client.put_collection(
            "/v1/screens/S1/campaigns",
            vec![active_campaign("/v1/playlists/C1")],
        );
        let second = engine.run_cycle_at(SCREEN, now()).await.unwrap();
        assert_eq!(client.calls("/v1/screens/S1/campaigns"), 2);
        assert!(second.has_active_campaign);
        assert_eq!(second.campaigns.len(), 1);
    }

    #[tokio::test]
    async fn test_screen_without_id_keeps_previous_tree() {
        let client = fixture();
        let mut engine = SyncEngine::new(client.clone());
        let first = engine.run_cycle_at(SCREEN, now()).await.unwrap();

        client.put(SCREEN, json!({}));
        let err = engine.run_cycle_at(SCREEN, now()).await.unwrap_err();
        assert!(matches!(err, SyncError::RootFetchFailed { .. }));
        assert!(Arc::ptr_eq(engine.previous().unwrap(), &first));
    }
}
