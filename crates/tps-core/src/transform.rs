//! The per-event transformation pipeline.
//!
//! One strictly sequential pass over the feed: classify the course, consult
//! the filter rules, then rewrite title/location/description and emit the
//! event into its output group. Every event, retained or not, produces a
//! report record. Feed order is part of the contract: it determines filter
//! statistics and makes runs reproducible.

use std::collections::BTreeMap;

use crate::classify::{classify_course, classify_type};
use crate::config::CompiledConfig;
use crate::conflict::{ConflictReport, find_conflicts};
use crate::event::{SourceEvent, TransformedEvent};
use crate::filter::{FilterEngine, FilterRuleStats, RuleViolation};
use crate::location::parse_location;
use crate::report::{ChangeFlags, ReportRecord};
use crate::sanitize::sanitize_description;

/// Everything one run produces, as plain data. Writing files and rendering
/// the report are the caller's business.
#[derive(Debug)]
pub struct SplitOutcome {
    /// Retained events per output group, keyed by short code. Every
    /// configured group is present, empty or not.
    pub calendars: BTreeMap<String, Vec<TransformedEvent>>,
    /// One record per source event, in feed order.
    pub report: Vec<ReportRecord>,
    /// Per-rule filter statistics, in configured rule order.
    pub filter_stats: Vec<FilterRuleStats>,
    /// Cross-calendar overlap report.
    pub conflicts: ConflictReport,
}

/// Runs the full pipeline over a feed.
///
/// Events are processed in the order given. The only error conditions are
/// the two fatal rule violations; everything else (unmatched course,
/// default type tag, failed room parse) is recorded as report flags.
pub fn split_events(
    config: &CompiledConfig,
    events: &[SourceEvent],
) -> Result<SplitOutcome, RuleViolation> {
    let mut engine = FilterEngine::new(config);
    let mut calendars: BTreeMap<String, Vec<TransformedEvent>> = config
        .courses
        .iter()
        .map(|course| (course.short.clone(), Vec::new()))
        .collect();
    let mut report = Vec::with_capacity(events.len());

    for event in events {
        let start_local = event.start.with_timezone(&config.timezone);
        let end_local = event.end.with_timezone(&config.timezone);

        let Some(course) = classify_course(&event.title, &config.courses) else {
            tracing::debug!(title = %event.title, "event matched no configured course");
            report.push(ReportRecord::unmatched(event, start_local, end_local));
            continue;
        };

        if let Some(hit) = engine.evaluate(event, &course.code, &start_local, &end_local)? {
            report.push(ReportRecord::filtered(
                event,
                &course.code,
                &course.short,
                start_local,
                end_local,
                hit,
            ));
            continue;
        }

        let (type_tag, used_default) = classify_type(config, &course.code, &event.title);
        let parsed = parse_location(&event.location);
        let (clean_description, mazemap_removed) =
            sanitize_description(&event.description, &config.mazemap_url);

        let new_title = format!("{} {}", course.short, type_tag);
        let new_location = parsed.room.clone();
        let new_description = assemble_description(
            &event.title,
            &clean_description,
            &parsed.building,
            &parsed.room,
        );

        let flags = ChangeFlags {
            title_changed: new_title != event.title,
            location_changed: new_location != event.location.trim(),
            description_changed: new_description != event.description.trim(),
            mazemap_removed,
            used_default_type: used_default,
            room_parse_failed: !parsed.ok,
            filtered_out: false,
        };

        report.push(ReportRecord::retained(
            event,
            &course.code,
            &course.short,
            start_local,
            end_local,
            new_title.clone(),
            new_location.clone(),
            flags,
        ));

        calendars
            .entry(course.short.clone())
            .or_default()
            .push(TransformedEvent {
                uid: event.uid.clone(),
                short_code: course.short.clone(),
                start_local,
                end_local,
                title: new_title,
                location: new_location,
                description: new_description,
            });
    }

    engine.check_required_matches()?;

    let conflicts = if config.conflict_detector_enabled {
        find_conflicts(calendars.values().flatten(), config.conflicts_show_max)
    } else {
        ConflictReport::default()
    };

    Ok(SplitOutcome {
        calendars,
        report,
        filter_stats: engine.into_stats(),
        conflicts,
    })
}

/// Reassembles the output description: the literal original title, the
/// sanitized description, then building and room lines. Empty parts are
/// skipped; parts are joined with blank lines.
fn assemble_description(
    original_title: &str,
    clean_description: &str,
    building: &str,
    room: &str,
) -> String {
    let mut lines = vec![format!("Original title: {original_title}")];
    if !clean_description.is_empty() {
        lines.push(clean_description.to_string());
    }
    if !building.is_empty() {
        lines.push(format!("Building: {building}"));
    }
    if !room.is_empty() {
        lines.push(format!("Room: {room}"));
    }
    lines.join("\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::config::{CourseSpec, FilterRuleSpec, SplitConfig, TypeRuleSpec};

    fn test_config() -> SplitConfig {
        let mut config = SplitConfig {
            courses: vec![
                CourseSpec {
                    code: "TDT4100".to_string(),
                    short: "00".to_string(),
                    file: "00.ics".to_string(),
                },
                CourseSpec {
                    code: "IDATT2002".to_string(),
                    short: "02".to_string(),
                    file: "02.ics".to_string(),
                },
            ],
            ..SplitConfig::default()
        };
        config.type_rules.insert(
            "TDT4100".to_string(),
            vec![
                TypeRuleSpec {
                    pattern: "Øvingsforelesning".to_string(),
                    tag: "ØF".to_string(),
                },
                TypeRuleSpec {
                    pattern: "Forelesning".to_string(),
                    tag: "f".to_string(),
                },
            ],
        );
        config
    }

    fn event(uid: &str, title: &str, location: &str, hour: u32) -> SourceEvent {
        SourceEvent {
            uid: uid.to_string(),
            title: title.to_string(),
            location: location.to_string(),
            description: "Rom: https://use.mazemap.com/r1\nPensum kap 3".to_string(),
            start: Utc
                .with_ymd_and_hms(2026, 1, 5, hour, 15, 0)
                .single()
                .expect("valid test time"),
            end: Utc
                .with_ymd_and_hms(2026, 1, 5, hour + 2, 0, 0)
                .single()
                .expect("valid test time"),
        }
    }

    #[test]
    fn retained_event_is_fully_rewritten() {
        let config = test_config().compile().expect("should compile");
        let events = vec![event(
            "ev-1",
            "TDT4100 Forelesning",
            "Realfagbygget, R1",
            11,
        )];

        let outcome = split_events(&config, &events).expect("no violation");

        let group = &outcome.calendars["00"];
        assert_eq!(group.len(), 1);
        let transformed = &group[0];
        assert_eq!(transformed.title, "00 f");
        assert_eq!(transformed.location, "R1");
        assert_eq!(
            transformed.description,
            "Original title: TDT4100 Forelesning\n\nRom\nPensum kap 3\n\nBuilding: Realfagbygget\n\nRoom: R1"
        );

        let record = &outcome.report[0];
        assert_eq!(record.course_code.as_deref(), Some("TDT4100"));
        assert_eq!(record.new_title.as_deref(), Some("00 f"));
        assert!(record.flags.title_changed);
        assert!(record.flags.location_changed);
        assert!(record.flags.description_changed);
        assert!(record.flags.mazemap_removed);
        assert!(!record.flags.used_default_type);
        assert!(!record.flags.room_parse_failed);
    }

    #[test]
    fn unmatched_event_emits_record_but_no_output() {
        let config = test_config().compile().expect("should compile");
        let events = vec![event("ev-1", "INGEN1001 Undervisning", "R1", 11)];

        let outcome = split_events(&config, &events).expect("no violation");

        assert!(outcome.calendars.values().all(Vec::is_empty));
        assert_eq!(outcome.report.len(), 1);
        let record = &outcome.report[0];
        assert!(record.course_code.is_none());
        assert!(record.new_title.is_none());
        assert!(!record.flags.filtered_out);
    }

    #[test]
    fn filtered_event_carries_rule_id_and_reason() {
        let mut split = test_config();
        split.event_filters = vec![FilterRuleSpec {
            id: "drop-f1".to_string(),
            course_code: Some("TDT4100".to_string()),
            location_contains: Some("F1".to_string()),
            reason: Some("duplicate stream".to_string()),
            ..FilterRuleSpec::default()
        }];
        let config = split.compile().expect("should compile");

        let events = vec![
            event("keep", "TDT4100 Forelesning", "Realfagbygget, R1", 9),
            event("drop", "TDT4100 Forelesning", "Gamle fysikk, F1", 12),
        ];
        let outcome = split_events(&config, &events).expect("no violation");

        assert_eq!(outcome.calendars["00"].len(), 1);
        assert_eq!(outcome.calendars["00"][0].uid, "keep");

        let dropped = &outcome.report[1];
        assert!(dropped.flags.filtered_out);
        assert_eq!(dropped.filter_rule_id.as_deref(), Some("drop-f1"));
        assert_eq!(dropped.filter_reason.as_deref(), Some("duplicate stream"));
        assert!(dropped.new_title.is_none());

        assert_eq!(outcome.filter_stats[0].matched, 1);
        assert_eq!(outcome.filter_stats[0].removed, 1);
    }

    #[test]
    fn default_type_and_room_parse_failure_are_flagged() {
        let config = test_config().compile().expect("should compile");
        let events = vec![event("ev-1", "IDATT2002 Workshop", "Foo Bar Baz", 11)];

        let outcome = split_events(&config, &events).expect("no violation");

        let record = &outcome.report[0];
        assert!(record.flags.used_default_type);
        assert!(record.flags.room_parse_failed);
        // The raw location survives as the room when no token matches.
        assert_eq!(outcome.calendars["02"][0].location, "Foo Bar Baz");
        assert_eq!(outcome.calendars["02"][0].title, "02 f");
    }

    #[test]
    fn every_configured_group_is_present_even_when_empty() {
        let config = test_config().compile().expect("should compile");
        let outcome = split_events(&config, &[]).expect("no violation");
        assert_eq!(outcome.calendars.len(), 2);
        assert!(outcome.calendars.contains_key("00"));
        assert!(outcome.calendars.contains_key("02"));
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let mut split = test_config();
        split.event_filters = vec![FilterRuleSpec {
            id: "drop-morning".to_string(),
            start_time: Some("10:15".to_string()),
            ..FilterRuleSpec::default()
        }];
        let config = split.compile().expect("should compile");

        // 09:15 UTC = 10:15 Oslo in winter.
        let events = vec![
            event("a", "TDT4100 Forelesning", "R1", 9),
            event("b", "TDT4100 Øvingsforelesning", "R2", 11),
            event("c", "IDATT2002 Forelesning", "R1", 9),
        ];

        let first = split_events(&config, &events).expect("no violation");
        let second = split_events(&config, &events).expect("no violation");

        assert_eq!(first.filter_stats[0].matched, 2);
        assert_eq!(
            first.filter_stats[0].matched,
            second.filter_stats[0].matched
        );
        assert_eq!(first.report.len(), second.report.len());
        assert_eq!(
            first.calendars["00"].len(),
            second.calendars["00"].len()
        );
    }

    #[test]
    fn max_matches_violation_halts_processing() {
        let mut split = test_config();
        split.event_filters = vec![FilterRuleSpec {
            id: "once".to_string(),
            title_contains: Some("Forelesning".to_string()),
            max_matches: Some(1),
            ..FilterRuleSpec::default()
        }];
        let config = split.compile().expect("should compile");

        let events = vec![
            event("a", "TDT4100 Forelesning", "R1", 8),
            event("b", "TDT4100 Forelesning", "R1", 10),
            event("c", "IDATT2002 Annet", "R1", 12),
        ];

        let violation = split_events(&config, &events).expect_err("second match must abort");
        assert!(matches!(
            violation,
            RuleViolation::MaxMatchesExceeded { .. }
        ));
    }

    #[test]
    fn require_at_least_one_match_aborts_after_full_pass() {
        let mut split = test_config();
        split.event_filters = vec![FilterRuleSpec {
            id: "never-hits".to_string(),
            title_contains: Some("Kollokvium".to_string()),
            require_at_least_one_match: true,
            ..FilterRuleSpec::default()
        }];
        let config = split.compile().expect("should compile");

        let events = vec![event("a", "TDT4100 Forelesning", "R1", 9)];
        let violation = split_events(&config, &events).expect_err("must abort");
        assert!(matches!(
            violation,
            RuleViolation::NeverMatched { rule_id } if rule_id == "never-hits"
        ));
    }

    #[test]
    fn conflict_detector_sees_events_across_groups() {
        let config = test_config().compile().expect("should compile");
        let events = vec![
            event("a", "TDT4100 Forelesning", "R1", 11),
            event("b", "IDATT2002 Forelesning", "R2", 12),
        ];

        // a: 11:15-13:00, b: 12:15-14:00 UTC; they overlap.
        let outcome = split_events(&config, &events).expect("no violation");
        assert_eq!(outcome.conflicts.total, 1);
        assert_ne!(
            outcome.conflicts.samples[0].first.short_code,
            outcome.conflicts.samples[0].second.short_code
        );
    }

    #[test]
    fn conflict_detector_can_be_disabled() {
        let mut split = test_config();
        split.conflict_detector_enabled = false;
        let config = split.compile().expect("should compile");
        let events = vec![
            event("a", "TDT4100 Forelesning", "R1", 11),
            event("b", "IDATT2002 Forelesning", "R2", 12),
        ];

        let outcome = split_events(&config, &events).expect("no violation");
        assert_eq!(outcome.conflicts.total, 0);
        assert!(outcome.conflicts.samples.is_empty());
    }
}
