//! Plain-text report rendering.
//!
//! Turns the pipeline's outcome into the run report: header counts, the
//! listings that need user action (unmatched events, default type tags,
//! failed room parses), filter rule statistics, dropped events, conflict
//! samples and a compact summary block.

use std::fmt::Write;

use chrono::DateTime;
use chrono_tz::Tz;
use tps_core::{ConflictReport, ReportRecord, SplitOutcome, SplitSummary};

const RULE: &str = "========================================================================";
const THIN: &str = "------------------------------------------------------------------------";

fn fmt_local(dt: &DateTime<Tz>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

fn fmt_span(start: &DateTime<Tz>, end: &DateTime<Tz>) -> String {
    format!("{}\u{2013}{}", fmt_local(start), end.format("%H:%M"))
}

/// Renders the full run report.
#[expect(
    clippy::too_many_lines,
    reason = "the report is one long sequence of sections"
)]
pub fn render_report(
    outcome: &SplitOutcome,
    summary: &SplitSummary,
    timezone: &str,
    dry_run: bool,
    conflict_detector_enabled: bool,
    conflicts_show_max: usize,
    pretty_summary: bool,
) -> String {
    let mut out = String::new();
    let mode = if dry_run {
        "DRY RUN (no files written)"
    } else {
        "WRITING FILES"
    };

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Mode:                        {mode}");
    let _ = writeln!(out, "Local timezone:              {timezone}");
    let _ = writeln!(out, "{THIN}");
    let _ = writeln!(out, "Events seen:                 {}", summary.total_events);
    let _ = writeln!(out, "Matched a course:            {}", summary.matched);
    let _ = writeln!(out, "Unmatched (new courses?):    {}", summary.unmatched);
    let _ = writeln!(out, "Filtered out (by rule):      {}", summary.filtered_out);
    let _ = writeln!(out, "{THIN}");
    let _ = writeln!(out, "Title changed:               {}", summary.title_changed);
    let _ = writeln!(
        out,
        "Location changed:            {}",
        summary.location_changed
    );
    let _ = writeln!(
        out,
        "Description changed:         {}",
        summary.description_changed
    );
    let _ = writeln!(
        out,
        "Mazemap link removed:        {}",
        summary.mazemap_removed
    );
    let _ = writeln!(
        out,
        "Default type used:           {}",
        summary.used_default_type
    );
    let _ = writeln!(
        out,
        "Room token not found:        {}",
        summary.room_parse_failed
    );
    let _ = writeln!(out, "{THIN}");
    let _ = writeln!(
        out,
        "Conflicts across calendars:  {}",
        summary.conflict_total
    );
    let _ = writeln!(out, "{RULE}");

    if summary.unmatched > 0 {
        let _ = writeln!(out, "\n[1] Events matching no configured course:");
        for record in unmatched(&outcome.report) {
            let _ = writeln!(
                out,
                "- {} | '{}' | location '{}'",
                fmt_span(&record.start_local, &record.end_local),
                record.old_title,
                record.old_location
            );
        }
        let _ = writeln!(out, "-> Fix: add the course code(s) to the config.");
    }

    if summary.used_default_type > 0 {
        let _ = writeln!(out, "\n[2] Events that fell back to the default type tag:");
        for record in retained(&outcome.report).filter(|r| r.flags.used_default_type) {
            let _ = writeln!(
                out,
                "- {} | {} | '{}' -> '{}'",
                course_of(record),
                fmt_span(&record.start_local, &record.end_local),
                record.old_title,
                record.new_title.as_deref().unwrap_or("-")
            );
        }
        let _ = writeln!(out, "-> Fix: add or adjust type_rules for this course.");
    }

    if summary.room_parse_failed > 0 {
        let _ = writeln!(out, "\n[3] Events where no room token was found:");
        for record in retained(&outcome.report).filter(|r| r.flags.room_parse_failed) {
            let _ = writeln!(
                out,
                "- {} | {} | location '{}'",
                course_of(record),
                fmt_span(&record.start_local, &record.end_local),
                record.old_location
            );
        }
        let _ = writeln!(
            out,
            "-> Fix: check what the location looks like in the feed."
        );
    }

    if !outcome.filter_stats.is_empty() {
        let _ = writeln!(out, "\n[4] Filter rule statistics:");
        for stats in &outcome.filter_stats {
            let _ = writeln!(out, "- rule id: {}", stats.rule_id);
            let _ = writeln!(out, "  matched: {}", stats.matched);
            let _ = writeln!(out, "  removed: {}", stats.removed);
            if let Some(max) = stats.max_matches {
                let _ = writeln!(out, "  max_matches: {max}");
            }
            let _ = writeln!(
                out,
                "  require_at_least_one_match: {}",
                stats.require_at_least_one_match
            );
            let _ = writeln!(out, "  reason: {}", stats.reason);
        }
    }

    if summary.filtered_out > 0 {
        let _ = writeln!(out, "\n[5] Events removed by filter rules:");
        for record in outcome.report.iter().filter(|r| r.flags.filtered_out) {
            let _ = writeln!(
                out,
                "- [{}] {} | {} | '{}' | location '{}'",
                record.filter_rule_id.as_deref().unwrap_or("-"),
                course_of(record),
                fmt_span(&record.start_local, &record.end_local),
                record.old_title,
                record.old_location
            );
            let _ = writeln!(
                out,
                "  -> {}",
                record.filter_reason.as_deref().unwrap_or("(no reason)")
            );
        }
        let _ = writeln!(out, "-> Expected: these rules are doing their job.");
    }

    if conflict_detector_enabled {
        let _ = writeln!(
            out,
            "\n[6] Conflicts across all output calendars (showing up to {conflicts_show_max}):"
        );
        render_conflicts(&mut out, &outcome.conflicts);
    }

    let _ = writeln!(out, "\n[7] Sample lines (before -> after), first 10:");
    for record in retained(&outcome.report).take(10) {
        let _ = writeln!(
            out,
            "- {} | {}",
            course_of(record),
            fmt_span(&record.start_local, &record.end_local)
        );
        let _ = writeln!(
            out,
            "  title:    '{}' -> '{}'",
            record.old_title,
            record.new_title.as_deref().unwrap_or("-")
        );
        let _ = writeln!(
            out,
            "  location: '{}' -> '{}'",
            record.old_location,
            record.new_location.as_deref().unwrap_or("-")
        );
    }

    if pretty_summary {
        let _ = writeln!(out, "\n{RULE}");
        let _ = writeln!(out, "SUMMARY");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Mode: {mode}");
        let _ = writeln!(out, "Local timezone: {timezone}");
        let _ = writeln!(out, "{THIN}");
        let _ = writeln!(out, "Events per calendar:");
        for (short, count) in &summary.per_calendar {
            let _ = writeln!(out, "  - {short}: {count}");
        }
        let _ = writeln!(out, "{THIN}");
        if outcome.filter_stats.is_empty() {
            let _ = writeln!(out, "Filter rules: off");
        } else {
            let _ = writeln!(out, "Filter rules:");
            for stats in &outcome.filter_stats {
                let _ = writeln!(
                    out,
                    "  - {}: removed {} (matched {})",
                    stats.rule_id, stats.removed, stats.matched
                );
            }
        }
        let _ = writeln!(out, "{THIN}");
        let _ = writeln!(out, "Default type used: {}", summary.used_default_type);
        let _ = writeln!(out, "Room parse failures: {}", summary.room_parse_failed);
        let _ = writeln!(out, "Conflicts total: {}", summary.conflict_total);
        let _ = writeln!(out, "{RULE}");
    }

    out
}

fn render_conflicts(out: &mut String, conflicts: &ConflictReport) {
    if conflicts.total == 0 {
        let _ = writeln!(out, "- No conflicts found.");
        return;
    }
    for pair in &conflicts.samples {
        let _ = writeln!(out, "- Conflict:");
        for (label, event) in [("A", &pair.first), ("B", &pair.second)] {
            let _ = writeln!(
                out,
                "  {label}: {} [{}] {} ({})",
                fmt_span(&event.start_local, &event.end_local),
                event.short_code,
                event.title,
                event.location
            );
        }
    }
    let remainder = conflicts.total - conflicts.samples.len() as u64;
    if remainder > 0 {
        let _ = writeln!(out, "- ... and {remainder} more.");
    }
}

fn unmatched(report: &[ReportRecord]) -> impl Iterator<Item = &ReportRecord> {
    report.iter().filter(|r| r.course_code.is_none())
}

fn retained(report: &[ReportRecord]) -> impl Iterator<Item = &ReportRecord> {
    report
        .iter()
        .filter(|r| r.course_code.is_some() && !r.flags.filtered_out)
}

fn course_of(record: &ReportRecord) -> &str {
    record.course_code.as_deref().unwrap_or("-")
}
