//! Per-event decision records and run summary aggregation.
//!
//! Every source event gets exactly one [`ReportRecord`], including the ones
//! that matched no course or were dropped by a filter rule. The flags are
//! purely observational: they feed the report, never control flow.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::event::SourceEvent;
use crate::filter::FilterMatch;

/// What changed (or failed) while transforming one event.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ChangeFlags {
    pub title_changed: bool,
    pub location_changed: bool,
    pub description_changed: bool,
    pub mazemap_removed: bool,
    pub used_default_type: bool,
    pub room_parse_failed: bool,
    pub filtered_out: bool,
}

/// One decision record per source event.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub uid: String,
    /// `None` when no configured course code occurred in the title.
    pub course_code: Option<String>,
    pub short_code: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_local: DateTime<Tz>,
    pub end_local: DateTime<Tz>,
    pub old_title: String,
    pub new_title: Option<String>,
    pub old_location: String,
    pub new_location: Option<String>,
    pub flags: ChangeFlags,
    pub filter_reason: Option<String>,
    pub filter_rule_id: Option<String>,
}

impl ReportRecord {
    fn base(event: &SourceEvent, start_local: DateTime<Tz>, end_local: DateTime<Tz>) -> Self {
        Self {
            uid: event.uid.clone(),
            course_code: None,
            short_code: None,
            start: event.start,
            end: event.end,
            start_local,
            end_local,
            old_title: event.title.clone(),
            new_title: None,
            old_location: event.location.clone(),
            new_location: None,
            flags: ChangeFlags::default(),
            filter_reason: None,
            filter_rule_id: None,
        }
    }

    /// Record for an event whose title matched no configured course.
    pub fn unmatched(
        event: &SourceEvent,
        start_local: DateTime<Tz>,
        end_local: DateTime<Tz>,
    ) -> Self {
        Self::base(event, start_local, end_local)
    }

    /// Record for an event dropped by a filter rule.
    pub fn filtered(
        event: &SourceEvent,
        course_code: &str,
        short_code: &str,
        start_local: DateTime<Tz>,
        end_local: DateTime<Tz>,
        hit: FilterMatch,
    ) -> Self {
        let mut record = Self::base(event, start_local, end_local);
        record.course_code = Some(course_code.to_string());
        record.short_code = Some(short_code.to_string());
        record.flags.filtered_out = true;
        record.filter_reason = Some(hit.reason);
        record.filter_rule_id = Some(hit.rule_id);
        record
    }

    /// Record for a retained, transformed event.
    #[allow(clippy::too_many_arguments)]
    pub fn retained(
        event: &SourceEvent,
        course_code: &str,
        short_code: &str,
        start_local: DateTime<Tz>,
        end_local: DateTime<Tz>,
        new_title: String,
        new_location: String,
        flags: ChangeFlags,
    ) -> Self {
        let mut record = Self::base(event, start_local, end_local);
        record.course_code = Some(course_code.to_string());
        record.short_code = Some(short_code.to_string());
        record.new_title = Some(new_title);
        record.new_location = Some(new_location);
        record.flags = flags;
        record
    }
}

/// Aggregated counts over one run, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub total_events: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub filtered_out: usize,
    pub title_changed: usize,
    pub location_changed: usize,
    pub description_changed: usize,
    pub mazemap_removed: usize,
    pub used_default_type: usize,
    pub room_parse_failed: usize,
    /// Retained events per output group, keyed by short code.
    pub per_calendar: BTreeMap<String, usize>,
    pub conflict_total: u64,
}

/// Computes summary counts over a finished run.
pub fn summarize(outcome: &crate::transform::SplitOutcome) -> SplitSummary {
    let report = &outcome.report;
    let count =
        |predicate: fn(&ReportRecord) -> bool| report.iter().filter(|r| predicate(r)).count();

    let per_calendar = outcome
        .calendars
        .iter()
        .map(|(short, events)| (short.clone(), events.len()))
        .collect();

    let matched = count(|r| r.course_code.is_some());
    SplitSummary {
        total_events: report.len(),
        matched,
        unmatched: report.len() - matched,
        filtered_out: count(|r| r.flags.filtered_out),
        title_changed: count(|r| r.flags.title_changed),
        location_changed: count(|r| r.flags.location_changed),
        description_changed: count(|r| r.flags.description_changed),
        mazemap_removed: count(|r| r.flags.mazemap_removed),
        used_default_type: count(|r| r.flags.used_default_type),
        room_parse_failed: count(|r| r.flags.room_parse_failed),
        per_calendar,
        conflict_total: outcome.conflicts.total,
    }
}
