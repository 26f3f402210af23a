//! # Change Gate
//!
//! Decides how much of a freshly built tree the renderer needs to hear about.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  observe(tree)                                                          │
//! │     │                                                                   │
//! │     ├── coarse hash = sha256(json(tree.coarse()))                       │
//! │     ├── region hash = sha256(json(tree.regions))                        │
//! │     ▼                                                                   │
//! │  coarse hash differs ──► ScreenChanged { coarse, removed_regions }      │
//! │  region hash differs ──► RegionOnlyChanged                              │
//! │  both equal          ──► Unchanged                                      │
//! │                                                                         │
//! │  Whatever the decision, the caller forwards every region's content to   │
//! │  the scheduler so time-based publication is re-evaluated each cycle.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use marquee_core::{CoarseScreen, ScreenTree};

use crate::error::SyncResult;

/// Outcome of observing one cycle's tree.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Layout, region set or screen metadata changed.
    ScreenChanged {
        coarse: CoarseScreen,
        /// Regions present in the previous tree but not in this one.
        removed_regions: Vec<String>,
    },

    /// Only slide-level content changed.
    RegionOnlyChanged,

    /// Nothing changed since the previous cycle.
    Unchanged,
}

/// Remembers the previous cycle's hashes.
#[derive(Debug, Default)]
pub struct ChangeGate {
    coarse_hash: Option<String>,
    region_hash: Option<String>,
    region_ids: Vec<String>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, tree: &ScreenTree) -> SyncResult<GateDecision> {
        let coarse = tree.coarse();
        let coarse_hash = content_hash(&coarse)?;
        let region_hash = content_hash(&tree.regions)?;

        let screen_changed = self.coarse_hash.as_deref() != Some(coarse_hash.as_str());
        let regions_changed = self.region_hash.as_deref() != Some(region_hash.as_str());

        let decision = if screen_changed {
            let current: HashSet<&str> = coarse.region_ids.iter().map(String::as_str).collect();
            let removed_regions = self
                .region_ids
                .iter()
                .filter(|id| !current.contains(id.as_str()))
                .cloned()
                .collect();
            debug!(screen_id = %tree.id, hash = %coarse_hash, "Screen structure changed");
            GateDecision::ScreenChanged {
                coarse: coarse.clone(),
                removed_regions,
            }
        } else if regions_changed {
            debug!(screen_id = %tree.id, "Region content changed");
            GateDecision::RegionOnlyChanged
        } else {
            GateDecision::Unchanged
        };

        self.coarse_hash = Some(coarse_hash);
        self.region_hash = Some(region_hash);
        self.region_ids = coarse.region_ids;
        Ok(decision)
    }
}

/// Hex SHA-256 of a value's JSON form.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> SyncResult<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{
        Grid, LayoutDescriptor, PlaylistDescriptor, RegionContent, RegionPlacement,
        ScreenChecksums, SlideDescriptor,
    };

    fn tree(region_ids: &[&str], slide: &str) -> ScreenTree {
        ScreenTree {
            id: "/v1/screens/S1".into(),
            title: "Lobby".into(),
            layout: Some(LayoutDescriptor {
                id: Some("/v1/layouts/L1".into()),
                grid: Grid { rows: 1, columns: region_ids.len() as u32 },
                regions: region_ids
                    .iter()
                    .map(|id| RegionPlacement {
                        id: id.to_string(),
                        title: String::new(),
                        grid_area: vec!["a".into()],
                    })
                    .collect(),
            }),
            checksums: ScreenChecksums::default(),
            has_active_campaign: false,
            campaigns: Vec::new(),
            regions: region_ids
                .iter()
                .map(|id| {
                    let mut playlist = PlaylistDescriptor::new("/v1/playlists/P1");
                    playlist.slides.push(SlideDescriptor::new(slide));
                    RegionContent {
                        region_id: id.to_string(),
                        playlists: vec![playlist],
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn test_first_observation_is_screen_change() {
        let mut gate = ChangeGate::new();
        let decision = gate.observe(&tree(&["R1"], "/v1/slides/A")).unwrap();
        assert!(matches!(
            decision,
            GateDecision::ScreenChanged { ref removed_regions, .. } if removed_regions.is_empty()
        ));
    }

    #[test]
    fn test_region_edits_do_not_change_screen() {
        let mut gate = ChangeGate::new();
        gate.observe(&tree(&["R1"], "/v1/slides/A")).unwrap();

        let decision = gate.observe(&tree(&["R1"], "/v1/slides/B")).unwrap();
        assert_eq!(decision, GateDecision::RegionOnlyChanged);

        let decision = gate.observe(&tree(&["R1"], "/v1/slides/B")).unwrap();
        assert_eq!(decision, GateDecision::Unchanged);
    }

    #[test]
    fn test_checksums_are_not_hashed() {
        let mut gate = ChangeGate::new();
        gate.observe(&tree(&["R1"], "/v1/slides/A")).unwrap();

        let mut next = tree(&["R1"], "/v1/slides/A");
        next.checksums.regions = Some("changed".into());
        assert_eq!(gate.observe(&next).unwrap(), GateDecision::Unchanged);
    }

    #[test]
    fn test_removed_regions_reported() {
        let mut gate = ChangeGate::new();
        gate.observe(&tree(&["R1", "R2"], "/v1/slides/A")).unwrap();

        match gate.observe(&tree(&["R1"], "/v1/slides/A")).unwrap() {
            GateDecision::ScreenChanged {
                coarse,
                removed_regions,
            } => {
                assert_eq!(coarse.region_ids, vec!["R1".to_string()]);
                assert_eq!(removed_regions, vec!["R2".to_string()]);
            }
            other => panic!("expected screen change, got {other:?}"),
        }
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(&tree(&["R1"], "/v1/slides/A").coarse()).unwrap();
        let b = content_hash(&tree(&["R1"], "/v1/slides/B").coarse()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
