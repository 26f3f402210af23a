//! # Region Rotation
//!
//! The per-region "now playing" state machine. Pure: the caller supplies the
//! current time and delivers the events; the async scheduler in
//! `marquee-sync` owns one of these per region.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            update(no candidates)                                        │
//! │         ┌───────────────────────┐                                       │
//! │         ▼                       │                                       │
//! │    ┌─────────┐  update(n > 0) ┌─┴────────┐  advance(head id)           │
//! │    │  Empty  │ ─────────────► │ Rotating │ ──────┐                      │
//! │    └─────────┘                └──────────┘ ◄─────┘                      │
//! │                                                                         │
//! │  Rotating buffer (capacity = min(3, candidates)):                      │
//! │                                                                         │
//! │    [ now playing | next | after next ]   ◄── refill from cursor        │
//! │         ▲                                     (wraps modulo n)          │
//! │         └── popped when the renderer reports its execution id done     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Candidates are the slides of schedulable playlists that are themselves
//! playable, in playlist-then-slide order. They are re-derived on every
//! update and every advance so publish windows opening or closing take
//! effect at the next refill.

use std::collections::VecDeque;

use chrono::{DateTime, TimeZone};

use crate::publication::{playlist_schedulable_at, slide_playable_at};
use crate::types::{PlaylistDescriptor, ScheduledSlide, SlideDescriptor};

/// Maximum number of scheduled instances held per region.
pub const ROTATION_BUFFER_SIZE: usize = 3;

/// Coarse state of a region's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// No playable slides.
    Empty,
    /// At least one instance is queued.
    Rotating,
}

/// What changed after feeding the rotation an event.
#[derive(Debug, Clone, PartialEq)]
pub enum RotationChange {
    /// The region went from `Empty` to `Rotating`; the head is now playing.
    Started(Vec<ScheduledSlide>),
    /// The buffer changed while rotating.
    Rescheduled(Vec<ScheduledSlide>),
    /// The region has nothing left to play.
    Emptied,
}

/// Rotation state for one region.
#[derive(Debug, Clone)]
pub struct RegionRotation {
    region_id: String,
    default_duration_ms: u64,
    playlists: Vec<PlaylistDescriptor>,
    buffer: VecDeque<ScheduledSlide>,
    cursor: usize,
}

impl RegionRotation {
    pub fn new(region_id: impl Into<String>, default_duration_ms: u64) -> Self {
        RegionRotation {
            region_id: region_id.into(),
            default_duration_ms,
            playlists: Vec::new(),
            buffer: VecDeque::with_capacity(ROTATION_BUFFER_SIZE),
            cursor: 0,
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn state(&self) -> RotationState {
        if self.buffer.is_empty() {
            RotationState::Empty
        } else {
            RotationState::Rotating
        }
    }

    /// The instance currently playing, if any.
    pub fn now_playing(&self) -> Option<&ScheduledSlide> {
        self.buffer.front()
    }

    /// The buffer in play order.
    pub fn scheduled(&self) -> Vec<ScheduledSlide> {
        self.buffer.iter().cloned().collect()
    }

    /// Replaces the region's playlists.
    pub fn update<Tz: TimeZone>(
        &mut self,
        playlists: Vec<PlaylistDescriptor>,
        now: &DateTime<Tz>,
    ) -> RotationChange {
        self.playlists = playlists;
        let was_empty = self.buffer.is_empty();

        let candidates = self.candidates(now);
        if candidates.is_empty() {
            self.buffer.clear();
            self.cursor = 0;
            return RotationChange::Emptied;
        }

        if was_empty {
            self.cursor = 0;
            self.fill(&candidates);
            return RotationChange::Started(self.scheduled());
        }

        // Keep what is on screen, rebuild what comes after it.
        self.buffer.truncate(1);
        let head_position = self
            .buffer
            .front()
            .and_then(|head| candidates.iter().position(|c| c.id == head.slide.id));
        self.cursor = match head_position {
            Some(index) => (index + 1) % candidates.len(),
            None => self.cursor % candidates.len(),
        };
        self.fill(&candidates);
        RotationChange::Rescheduled(self.scheduled())
    }

    /// Handles "slide finished". Returns `None` for an execution id that is
    /// not the current head (a stale or duplicate report).
    pub fn advance<Tz: TimeZone>(
        &mut self,
        execution_id: &str,
        now: &DateTime<Tz>,
    ) -> Option<RotationChange> {
        match self.buffer.front() {
            Some(head) if head.execution_id == execution_id => {}
            _ => return None,
        }
        self.buffer.pop_front();

        let candidates = self.candidates(now);
        if candidates.is_empty() {
            self.buffer.clear();
            self.cursor = 0;
            return Some(RotationChange::Emptied);
        }

        self.cursor %= candidates.len();
        self.buffer.truncate(capacity(candidates.len()));
        self.fill(&candidates);
        Some(RotationChange::Rescheduled(self.scheduled()))
    }

    fn fill(&mut self, candidates: &[SlideDescriptor]) {
        let target = capacity(candidates.len());
        while self.buffer.len() < target {
            let slide = &candidates[self.cursor];
            self.buffer.push_back(ScheduledSlide::new(
                &self.region_id,
                slide,
                self.default_duration_ms,
            ));
            self.cursor = (self.cursor + 1) % candidates.len();
        }
    }

    /// Playable slides of schedulable playlists, in playlist-then-slide order.
    fn candidates<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<SlideDescriptor> {
        self.playlists
            .iter()
            .filter(|playlist| playlist_schedulable_at(playlist, now))
            .flat_map(|playlist| playlist.slides.iter())
            .filter(|slide| slide_playable_at(slide, now))
            .cloned()
            .collect()
    }
}

fn capacity(candidates: usize) -> usize {
    candidates.min(ROTATION_BUFFER_SIZE)
}
