//! # Recurrence Rules
//!
//! Evaluates iCalendar-style recurrence rules (RFC 5545 `RRULE`) against a
//! wall-clock window.
//!
//! ## Rule Text
//! ```text
//! DTSTART:20240105T120000Z
//! RRULE:FREQ=WEEKLY;BYDAY=FR;BYHOUR=12;BYMINUTE=0
//! EXDATE:20240112T120000Z
//! ```
//!
//! ## Wall-Clock Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every date-time in a rule is read as NAIVE wall-clock fields.         │
//! │  A trailing `Z` and any `TZID=` parameter are accepted and dropped.    │
//! │                                                                         │
//! │  DTSTART:20240105T120000Z   →   2024-01-05 12:00:00 (no zone)          │
//! │                                                                         │
//! │  Callers query with a naive "now" built from the display's LOCAL       │
//! │  clock, so "12:00" in a rule means 12:00 on the wall of the venue.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Evaluation Strategy
//! Instead of expanding the rule from DTSTART, [`RecurrenceRule::first_between`]
//! walks only the days inside the query window, generates the candidate times
//! for each matching day and checks period alignment (`INTERVAL`) directly.
//! `COUNT` is the one part that needs a walk from DTSTART.
//!
//! ## Supported Parts
//! `FREQ` (YEARLY, MONTHLY, WEEKLY, DAILY, HOURLY, MINUTELY), `INTERVAL`,
//! `COUNT`, `UNTIL`, `WKST`, `BYMONTH`, `BYMONTHDAY`, `BYDAY` (with ordinals
//! in monthly/yearly scope), `BYHOUR`, `BYMINUTE`, `BYSECOND`.

use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::error::{RecurrenceError, RecurrenceResult};

/// Upper bound on days walked from DTSTART when enforcing `COUNT`.
const MAX_COUNT_WALK_DAYS: i64 = 366 * 200;

// =============================================================================
// Frequency
// =============================================================================

/// Base repetition unit of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Frequency {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YEARLY" => Ok(Frequency::Yearly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "WEEKLY" => Ok(Frequency::Weekly),
            "DAILY" => Ok(Frequency::Daily),
            "HOURLY" => Ok(Frequency::Hourly),
            "MINUTELY" => Ok(Frequency::Minutely),
            other => Err(RecurrenceError::UnsupportedFrequency(other.to_string())),
        }
    }
}

/// A `BYDAY` entry, e.g. `FR`, `1MO` (first Monday) or `-1SU` (last Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySpec {
    pub ordinal: Option<i32>,
    pub weekday: Weekday,
}

// =============================================================================
// Rule
// =============================================================================

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    dtstart: NaiveDateTime,
    freq: Frequency,
    interval: u32,
    count: Option<u32>,
    until: Option<NaiveDateTime>,
    week_start: Weekday,
    by_month: Vec<u32>,
    by_month_day: Vec<i32>,
    by_day: Vec<WeekdaySpec>,
    by_hour: Vec<u32>,
    by_minute: Vec<u32>,
    by_second: Vec<u32>,
    exdates: Vec<NaiveDateTime>,
}

impl FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecurrenceRule::parse(s)
    }
}

impl RecurrenceRule {
    /// Parses rule text made of `DTSTART`, `RRULE` and optional `EXDATE` lines.
    ///
    /// Lines may be separated by real newlines or by a literal `\n` (as rules
    /// often arrive JSON-escaped twice).
    pub fn parse(text: &str) -> RecurrenceResult<Self> {
        let normalized = text.replace("\\n", "\n");

        let mut dtstart = None;
        let mut rule_line = None;
        let mut exdates = Vec::new();

        for raw in normalized.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let upper = line.to_ascii_uppercase();

            if upper.starts_with("DTSTART") {
                dtstart = Some(parse_date_time(property_value(line)?)?);
            } else if upper.starts_with("RRULE:") {
                rule_line = Some(line["RRULE:".len()..].to_string());
            } else if upper.starts_with("FREQ=") {
                rule_line = Some(line.to_string());
            } else if upper.starts_with("EXDATE") {
                for value in property_value(line)?.split(',') {
                    exdates.push(parse_date_time(value.trim())?);
                }
            } else {
                return Err(RecurrenceError::UnknownLine(line.to_string()));
            }
        }

        let rule_line = rule_line.ok_or(RecurrenceError::MissingRule)?;
        let dtstart = dtstart.ok_or(RecurrenceError::MissingStart)?;

        let mut rule = RecurrenceRule {
            dtstart,
            freq: Frequency::Daily,
            interval: 1,
            count: None,
            until: None,
            week_start: Weekday::Mon,
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            by_day: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            exdates,
        };

        let mut has_freq = false;
        for part in rule_line.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| RecurrenceError::part("RRULE", part))?;
            let name = name.to_ascii_uppercase();

            match name.as_str() {
                "FREQ" => {
                    rule.freq = value.parse()?;
                    has_freq = true;
                }
                "INTERVAL" => {
                    rule.interval = parse_number(&name, value, 1, u32::MAX)?;
                }
                "COUNT" => {
                    rule.count = Some(parse_number(&name, value, 0, u32::MAX)?);
                }
                "UNTIL" => {
                    rule.until = Some(parse_until(value)?);
                }
                "WKST" => {
                    rule.week_start = parse_weekday(value)?;
                }
                "BYMONTH" => rule.by_month = parse_list(&name, value, 1, 12)?,
                "BYHOUR" => rule.by_hour = parse_list(&name, value, 0, 23)?,
                "BYMINUTE" => rule.by_minute = parse_list(&name, value, 0, 59)?,
                "BYSECOND" => rule.by_second = parse_list(&name, value, 0, 59)?,
                "BYMONTHDAY" => {
                    rule.by_month_day = value
                        .split(',')
                        .map(|v| {
                            let day: i32 = v
                                .trim()
                                .parse()
                                .map_err(|_| RecurrenceError::part(&name, v))?;
                            if day == 0 || !(-31..=31).contains(&day) {
                                return Err(RecurrenceError::part(&name, v));
                            }
                            Ok(day)
                        })
                        .collect::<RecurrenceResult<_>>()?;
                }
                "BYDAY" => {
                    rule.by_day = value
                        .split(',')
                        .map(|v| parse_weekday_spec(v.trim()))
                        .collect::<RecurrenceResult<_>>()?;
                }
                other => return Err(RecurrenceError::UnsupportedPart(other.to_string())),
            }
        }

        if !has_freq {
            return Err(RecurrenceError::part("RRULE", "missing FREQ"));
        }

        rule.by_hour.sort_unstable();
        rule.by_minute.sort_unstable();
        rule.by_second.sort_unstable();

        Ok(rule)
    }

    pub fn dtstart(&self) -> NaiveDateTime {
        self.dtstart
    }

    pub fn frequency(&self) -> Frequency {
        self.freq
    }

    /// Returns the first occurrence `s` with `start <= s <= end`, if any.
    pub fn first_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<NaiveDateTime> {
        if end < start || end < self.dtstart {
            return None;
        }
        if let Some(until) = self.until {
            if start > until {
                return None;
            }
        }

        let mut date = start.date().max(self.dtstart.date());
        while date <= end.date() {
            if self.matches_date(date) {
                for time in self.times_for_day() {
                    let candidate = date.and_time(time);
                    if candidate < start {
                        continue;
                    }
                    if candidate > end {
                        break;
                    }
                    if self.is_occurrence(candidate) && !self.exdates.contains(&candidate) {
                        return Some(candidate);
                    }
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        None
    }

    /// True if some occurrence starts within `duration` before `at` (inclusive).
    pub fn occurs_within(&self, at: NaiveDateTime, duration: Duration) -> bool {
        self.first_between(at - duration, at).is_some()
    }

    // -------------------------------------------------------------------------
    // Matching
    // -------------------------------------------------------------------------

    /// Checks everything about `t` except the day-level filters.
    fn is_occurrence(&self, t: NaiveDateTime) -> bool {
        if t < self.dtstart {
            return false;
        }
        if let Some(until) = self.until {
            if t > until {
                return false;
            }
        }
        if !self.sub_daily_aligned(t) {
            return false;
        }
        match self.count {
            Some(count) => self.index_of(t).map_or(false, |index| index < count),
            None => true,
        }
    }

    /// Day-level filters: BY* date parts, RFC defaults and period alignment.
    fn matches_date(&self, date: NaiveDate) -> bool {
        let start = self.dtstart.date();
        if date < start {
            return false;
        }

        if !self.by_month.is_empty() && !self.by_month.contains(&date.month()) {
            return false;
        }
        if !self.by_month_day.is_empty()
            && !self.by_month_day.iter().any(|&d| month_day_matches(date, d))
        {
            return false;
        }
        if !self.by_day.is_empty() && !self.by_day.iter().any(|spec| self.weekday_matches(date, spec)) {
            return false;
        }

        // Unspecified date parts inherit DTSTART's fields.
        let no_day_rules = self.by_month_day.is_empty() && self.by_day.is_empty();
        match self.freq {
            Frequency::Yearly if no_day_rules => {
                if self.by_month.is_empty() && date.month() != start.month() {
                    return false;
                }
                if date.day() != start.day() {
                    return false;
                }
            }
            Frequency::Monthly if no_day_rules => {
                if date.day() != start.day() {
                    return false;
                }
            }
            Frequency::Weekly if no_day_rules => {
                if date.weekday() != start.weekday() {
                    return false;
                }
            }
            _ => {}
        }

        let interval = i64::from(self.interval);
        match self.freq {
            Frequency::Yearly => i64::from(date.year() - start.year()) % interval == 0,
            Frequency::Monthly => months_between(start, date) % interval == 0,
            Frequency::Weekly => {
                let weeks = (self.week_start_of(date) - self.week_start_of(start)).num_days() / 7;
                weeks % interval == 0
            }
            Frequency::Daily => (date - start).num_days() % interval == 0,
            Frequency::Hourly | Frequency::Minutely => true,
        }
    }

    fn weekday_matches(&self, date: NaiveDate, spec: &WeekdaySpec) -> bool {
        if date.weekday() != spec.weekday {
            return false;
        }
        let Some(n) = spec.ordinal else {
            return true;
        };

        let month_scope = match self.freq {
            Frequency::Monthly => true,
            Frequency::Yearly => !self.by_month.is_empty(),
            // Ordinals only carry meaning in monthly or yearly scope.
            _ => return true,
        };

        let (position, length) = if month_scope {
            (date.day() as i32, days_in_month(date.year(), date.month()) as i32)
        } else {
            (date.ordinal() as i32, days_in_year(date.year()) as i32)
        };

        if n > 0 {
            (position - 1) / 7 + 1 == n
        } else {
            (length - position) / 7 + 1 == -n
        }
    }

    fn sub_daily_aligned(&self, t: NaiveDateTime) -> bool {
        let interval = i64::from(self.interval);
        let start = self.dtstart;
        let days = (t.date() - start.date()).num_days();
        match self.freq {
            Frequency::Hourly => {
                let hours = days * 24 + i64::from(t.hour()) - i64::from(start.hour());
                hours.rem_euclid(interval) == 0
            }
            Frequency::Minutely => {
                let minutes = (days * 24 + i64::from(t.hour()) - i64::from(start.hour())) * 60
                    + i64::from(t.minute())
                    - i64::from(start.minute());
                minutes.rem_euclid(interval) == 0
            }
            _ => true,
        }
    }

    /// Candidate times of day, ascending.
    fn times_for_day(&self) -> Vec<NaiveTime> {
        let hours: Vec<u32> = if !self.by_hour.is_empty() {
            self.by_hour.clone()
        } else if self.freq <= Frequency::Hourly {
            (0..24).collect()
        } else {
            vec![self.dtstart.hour()]
        };
        let minutes: Vec<u32> = if !self.by_minute.is_empty() {
            self.by_minute.clone()
        } else if self.freq == Frequency::Minutely {
            (0..60).collect()
        } else {
            vec![self.dtstart.minute()]
        };
        let seconds: Vec<u32> = if !self.by_second.is_empty() {
            self.by_second.clone()
        } else {
            vec![self.dtstart.second()]
        };

        let mut times = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
        for &h in &hours {
            for &m in &minutes {
                for &s in &seconds {
                    if let Some(time) = NaiveTime::from_hms_opt(h, m, s) {
                        times.push(time);
                    }
                }
            }
        }
        times
    }

    /// Zero-based position of `t` in the rule's occurrence sequence, walking
    /// from DTSTART. `None` if `t` is not reached within the walk bound or
    /// lies beyond `COUNT`.
    fn index_of(&self, t: NaiveDateTime) -> Option<u32> {
        let count = self.count?;
        let mut seen = 0u32;
        let mut date = self.dtstart.date();
        let last = t.date().min(self.dtstart.date() + Duration::days(MAX_COUNT_WALK_DAYS));

        while date <= last {
            if self.matches_date(date) {
                for time in self.times_for_day() {
                    let candidate = date.and_time(time);
                    if candidate < self.dtstart || !self.sub_daily_aligned(candidate) {
                        continue;
                    }
                    if self.until.map_or(false, |until| candidate > until) {
                        return None;
                    }
                    if candidate == t {
                        return Some(seen);
                    }
                    if candidate > t {
                        return None;
                    }
                    seen += 1;
                    if seen >= count {
                        return None;
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    fn week_start_of(&self, date: NaiveDate) -> NaiveDate {
        let offset = (date.weekday().num_days_from_monday() + 7
            - self.week_start.num_days_from_monday())
            % 7;
        date - Duration::days(i64::from(offset))
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Value after the first `:` of a property line (parameters are dropped).
fn property_value(line: &str) -> RecurrenceResult<&str> {
    line.split_once(':')
        .map(|(_, value)| value.trim())
        .ok_or_else(|| RecurrenceError::InvalidDate(line.to_string()))
}

fn parse_date_time(value: &str) -> RecurrenceResult<NaiveDateTime> {
    let value = value.trim().trim_end_matches(['Z', 'z']);
    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| RecurrenceError::InvalidDate(value.to_string()));
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .map_err(|_| RecurrenceError::InvalidDate(value.to_string()))
}

/// A date-only `UNTIL` includes the whole day.
fn parse_until(value: &str) -> RecurrenceResult<NaiveDateTime> {
    let trimmed = value.trim().trim_end_matches(['Z', 'z']);
    if trimmed.len() == 8 {
        return NaiveDate::parse_from_str(trimmed, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .ok_or_else(|| RecurrenceError::InvalidDate(value.to_string()));
    }
    parse_date_time(trimmed)
}

fn parse_number(name: &str, value: &str, min: u32, max: u32) -> RecurrenceResult<u32> {
    let n: u32 = value
        .trim()
        .parse()
        .map_err(|_| RecurrenceError::part(name, value))?;
    if n < min || n > max {
        return Err(RecurrenceError::part(name, value));
    }
    Ok(n)
}

fn parse_list(name: &str, value: &str, min: u32, max: u32) -> RecurrenceResult<Vec<u32>> {
    value
        .split(',')
        .map(|v| parse_number(name, v, min, max))
        .collect()
}

fn parse_weekday(value: &str) -> RecurrenceResult<Weekday> {
    match value.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(RecurrenceError::part("weekday", value)),
    }
}

fn parse_weekday_spec(value: &str) -> RecurrenceResult<WeekdaySpec> {
    if value.len() < 2 || !value.is_char_boundary(value.len() - 2) {
        return Err(RecurrenceError::part("BYDAY", value));
    }
    let (ordinal, day) = value.split_at(value.len() - 2);
    let weekday = parse_weekday(day)?;

    let ordinal = if ordinal.is_empty() {
        None
    } else {
        let n: i32 = ordinal
            .trim_start_matches('+')
            .parse()
            .map_err(|_| RecurrenceError::part("BYDAY", value))?;
        if n == 0 || !(-53..=53).contains(&n) {
            return Err(RecurrenceError::part("BYDAY", value));
        }
        Some(n)
    };

    Ok(WeekdaySpec { ordinal, weekday })
}

// =============================================================================
// Calendar helpers
// =============================================================================

fn month_day_matches(date: NaiveDate, day: i32) -> bool {
    if day > 0 {
        date.day() as i32 == day
    } else {
        let dim = days_in_month(date.year(), date.month()) as i32;
        date.day() as i32 == dim + 1 + day
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

fn days_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31).map_or(365, |d| d.ordinal())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_weekly_rule() {
        let rule: RecurrenceRule = "DTSTART:20240105T120000Z\nRRULE:FREQ=WEEKLY;BYDAY=FR;BYHOUR=12"
            .parse()
            .unwrap();
        assert_eq!(rule.frequency(), Frequency::Weekly);
        assert_eq!(rule.dtstart(), at(2024, 1, 5, 12, 0));
    }

    #[test]
    fn test_parse_escaped_newline_and_tzid() {
        let rule = RecurrenceRule::parse(
            "DTSTART;TZID=Europe/Copenhagen:20240105T120000\\nRRULE:FREQ=DAILY",
        )
        .unwrap();
        assert_eq!(rule.dtstart(), at(2024, 1, 5, 12, 0));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RecurrenceRule::parse("RRULE:FREQ=DAILY"),
            Err(RecurrenceError::MissingStart)
        );
        assert_eq!(
            RecurrenceRule::parse("DTSTART:20240105T120000Z"),
            Err(RecurrenceError::MissingRule)
        );
        assert!(matches!(
            RecurrenceRule::parse("DTSTART:20240105T120000Z\nRRULE:FREQ=SECONDLY"),
            Err(RecurrenceError::UnsupportedFrequency(_))
        ));
        assert!(matches!(
            RecurrenceRule::parse("DTSTART:20240105T120000Z\nRRULE:FREQ=DAILY;BYSETPOS=1"),
            Err(RecurrenceError::UnsupportedPart(_))
        ));
        assert!(matches!(
            RecurrenceRule::parse("DTSTART:20240105T120000Z\nRRULE:FREQ=DAILY;BYHOUR=24"),
            Err(RecurrenceError::InvalidPart { .. })
        ));
        assert!(matches!(
            RecurrenceRule::parse("DTSTART:2024-01-05\nRRULE:FREQ=DAILY"),
            Err(RecurrenceError::InvalidDate(_))
        ));
        assert!(matches!(
            RecurrenceRule::parse("DTSTART:20240105T120000Z\nRDATE:20240106T120000Z\nRRULE:FREQ=DAILY"),
            Err(RecurrenceError::UnknownLine(_))
        ));
    }

    #[test]
    fn test_weekly_friday_window() {
        let rule = RecurrenceRule::parse(
            "DTSTART:20240105T120000Z\nRRULE:FREQ=WEEKLY;BYDAY=FR;BYHOUR=12;BYMINUTE=0",
        )
        .unwrap();
        let five_minutes = Duration::seconds(300);

        // Friday 2024-03-15
        assert!(rule.occurs_within(at(2024, 3, 15, 12, 3), five_minutes));
        assert!(rule.occurs_within(at(2024, 3, 15, 12, 5), five_minutes));
        assert!(!rule.occurs_within(at(2024, 3, 15, 12, 6), five_minutes));
        // Thursday
        assert!(!rule.occurs_within(at(2024, 3, 14, 12, 3), five_minutes));
        // Before DTSTART
        assert!(!rule.occurs_within(at(2023, 12, 29, 12, 3), five_minutes));
    }

    #[test]
    fn test_by_month_excludes_months() {
        let rule = RecurrenceRule::parse(
            "DTSTART:20240105T120000Z\nRRULE:FREQ=WEEKLY;BYDAY=FR;BYMONTH=1,2,3;BYHOUR=12;BYMINUTE=0",
        )
        .unwrap();
        let window = Duration::seconds(300);
        assert!(rule.occurs_within(at(2024, 3, 15, 12, 1), window));
        // Friday 2024-04-12 is outside BYMONTH
        assert!(!rule.occurs_within(at(2024, 4, 12, 12, 1), window));
    }

    #[test]
    fn test_daily_defaults_to_dtstart_time() {
        let rule = RecurrenceRule::parse("DTSTART:20240101T083000\nRRULE:FREQ=DAILY").unwrap();
        assert_eq!(
            rule.first_between(at(2024, 2, 1, 0, 0), at(2024, 2, 1, 23, 59)),
            Some(at(2024, 2, 1, 8, 30))
        );
    }

    #[test]
    fn test_interval_alignment() {
        // Every other week from Monday 2024-01-01.
        let rule =
            RecurrenceRule::parse("DTSTART:20240101T090000\nRRULE:FREQ=WEEKLY;INTERVAL=2").unwrap();
        let hour = Duration::hours(1);
        assert!(rule.occurs_within(at(2024, 1, 15, 9, 30), hour));
        assert!(!rule.occurs_within(at(2024, 1, 8, 9, 30), hour));

        let hourly =
            RecurrenceRule::parse("DTSTART:20240101T090000\nRRULE:FREQ=HOURLY;INTERVAL=3").unwrap();
        assert!(hourly.occurs_within(at(2024, 1, 2, 12, 10), Duration::minutes(15)));
        assert!(!hourly.occurs_within(at(2024, 1, 2, 13, 10), Duration::minutes(15)));
    }

    #[test]
    fn test_count_limits_occurrences() {
        let rule = RecurrenceRule::parse("DTSTART:20240101T100000\nRRULE:FREQ=DAILY;COUNT=3").unwrap();
        let minute = Duration::minutes(1);
        assert!(rule.occurs_within(at(2024, 1, 3, 10, 0), minute));
        assert!(!rule.occurs_within(at(2024, 1, 4, 10, 0), minute));
    }

    #[test]
    fn test_until_is_inclusive() {
        let rule =
            RecurrenceRule::parse("DTSTART:20240101T100000\nRRULE:FREQ=DAILY;UNTIL=20240105").unwrap();
        let minute = Duration::minutes(1);
        assert!(rule.occurs_within(at(2024, 1, 5, 10, 0), minute));
        assert!(!rule.occurs_within(at(2024, 1, 6, 10, 0), minute));
    }

    #[test]
    fn test_monthly_ordinal_and_negative_days() {
        let last_sunday =
            RecurrenceRule::parse("DTSTART:20240101T100000\nRRULE:FREQ=MONTHLY;BYDAY=-1SU").unwrap();
        let minute = Duration::minutes(1);
        assert!(last_sunday.occurs_within(at(2024, 3, 31, 10, 0), minute));
        assert!(!last_sunday.occurs_within(at(2024, 3, 24, 10, 0), minute));

        let last_day =
            RecurrenceRule::parse("DTSTART:20240101T100000\nRRULE:FREQ=MONTHLY;BYMONTHDAY=-1").unwrap();
        assert!(last_day.occurs_within(at(2024, 2, 29, 10, 0), minute));
        assert!(!last_day.occurs_within(at(2024, 2, 28, 10, 0), minute));
    }

    #[test]
    fn test_exdate_removes_occurrence() {
        let rule = RecurrenceRule::parse(
            "DTSTART:20240101T100000\nRRULE:FREQ=DAILY\nEXDATE:20240102T100000,20240103T100000",
        )
        .unwrap();
        let minute = Duration::minutes(1);
        assert!(!rule.occurs_within(at(2024, 1, 2, 10, 0), minute));
        assert!(rule.occurs_within(at(2024, 1, 4, 10, 0), minute));
    }

    #[test]
    fn test_long_duration_spans_days() {
        // Starts every Monday at 08:00 and lasts three days.
        let rule =
            RecurrenceRule::parse("DTSTART:20240101T080000\nRRULE:FREQ=WEEKLY;BYDAY=MO").unwrap();
        let three_days = Duration::days(3);
        assert!(rule.occurs_within(at(2024, 1, 10, 7, 0), three_days));
        assert!(!rule.occurs_within(at(2024, 1, 11, 9, 0), three_days));
    }
}
