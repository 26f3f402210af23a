//! # Publication Filter
//!
//! Pure predicates deciding whether a playlist or slide may be shown "now".
//!
//! ## Schedulability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  schedulable = is_published(window)                                     │
//! │                AND (no schedules OR any schedule occurs now)            │
//! │                                                                         │
//! │  is_published:   from ≤ now ≤ to      (missing bound = open)           │
//! │  occurs:         ∃ start s in rule:  s ≤ now ≤ s + duration            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pretend-UTC Evaluation
//! Recurrence rules carry wall-clock fields. "Now" is projected onto the
//! same plane by taking its LOCAL fields as if they were UTC, and the
//! duration window `[now - duration, now]` is compared on that plane. This is
//! not true UTC arithmetic across DST changes, and existing schedules rely
//! on it staying that way.
//!
//! A playlist's window dominates its slides: callers check the playlist
//! first and only then look at its slides.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::recurrence::RecurrenceRule;
use crate::types::{PlaylistDescriptor, PublishWindow, Schedule, SlideDescriptor};

/// Occurrence durations are clamped to this many seconds (about a century).
const MAX_OCCURRENCE_SECS: i64 = 100 * 366 * 86_400;

/// True if `now` lies within the window. Missing bounds are open.
pub fn is_published(window: &PublishWindow, now: DateTime<Utc>) -> bool {
    let after_start = window.from.map_or(true, |from| now >= from);
    let before_end = window.to.map_or(true, |to| now <= to);
    after_start && before_end
}

/// True if an occurrence of the schedule started within `duration` seconds
/// before `now` (inclusive on both ends).
///
/// An unparseable rule never occurs.
pub fn occurs_at<Tz: TimeZone>(schedule: &Schedule, now: &DateTime<Tz>) -> bool {
    let Ok(rule) = RecurrenceRule::parse(&schedule.rrule) else {
        return false;
    };

    let seconds = i64::try_from(schedule.duration).unwrap_or(i64::MAX);
    let duration = Duration::seconds(seconds.min(MAX_OCCURRENCE_SECS));
    rule.occurs_within(now.naive_local(), duration)
}

/// Publication window plus recurring schedules.
pub fn is_schedulable_at<Tz: TimeZone>(
    window: &PublishWindow,
    schedules: &[Schedule],
    now: &DateTime<Tz>,
) -> bool {
    if !is_published(window, now.with_timezone(&Utc)) {
        return false;
    }
    schedules.is_empty() || schedules.iter().any(|s| occurs_at(s, now))
}

pub fn playlist_schedulable_at<Tz: TimeZone>(playlist: &PlaylistDescriptor, now: &DateTime<Tz>) -> bool {
    is_schedulable_at(&playlist.published, &playlist.schedules, now)
}

/// A slide is playable if it resolved cleanly and is itself schedulable.
pub fn slide_playable_at<Tz: TimeZone>(slide: &SlideDescriptor, now: &DateTime<Tz>) -> bool {
    !slide.invalid && is_schedulable_at(&slide.published, &slide.schedules, now)
}
