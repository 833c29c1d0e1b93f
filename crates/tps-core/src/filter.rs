//! Rule-based event filtering with match-count safety guarantees.
//!
//! Rules are evaluated in configured order and the first rule whose present
//! predicates all hold drops the event. Two guarantees keep a stale config
//! from silently eating the wrong events: a rule may abort the run the
//! moment its match count exceeds `max_matches`, and a rule marked
//! `require_at_least_one_match` aborts the run if the full pass ends with
//! zero matches.

use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

use crate::config::{CompiledConfig, CompiledFilterRule};
use crate::event::SourceEvent;

/// Per-rule counters and echoed configuration, reported after the run.
///
/// `removed` equals `matched` in this design since every match drops the
/// event; both are kept so the report can state the guarantee explicitly.
#[derive(Debug, Clone, Serialize)]
pub struct FilterRuleStats {
    pub rule_id: String,
    pub matched: u64,
    pub removed: u64,
    pub require_at_least_one_match: bool,
    pub max_matches: Option<u64>,
    pub reason: String,
}

/// The rule that dropped an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    pub rule_id: String,
    pub reason: String,
}

/// Fatal rule violations. Both indicate the configuration no longer matches
/// the feed; neither is downgraded to a warning.
#[derive(Debug, Error)]
pub enum RuleViolation {
    /// A rule matched more events than its configured ceiling allows.
    /// Detected the instant the violating match occurs.
    #[error(
        "filter rule '{rule_id}' matched more than max_matches={max}: \
         last hit '{title}' | location '{location}' | {start}\u{2013}{end}"
    )]
    MaxMatchesExceeded {
        rule_id: String,
        max: u64,
        title: String,
        location: String,
        start: String,
        end: String,
    },
    /// A rule that required at least one match ended the pass with zero.
    /// Only checkable after the full pass.
    #[error("filter rule '{rule_id}' required at least one match but matched none")]
    NeverMatched { rule_id: String },
}

/// Evaluates the configured exclusion rules and owns their statistics for
/// one sequential pass.
#[derive(Debug)]
pub struct FilterEngine<'a> {
    enabled: bool,
    rules: &'a [CompiledFilterRule],
    stats: Vec<FilterRuleStats>,
}

impl<'a> FilterEngine<'a> {
    pub fn new(config: &'a CompiledConfig) -> Self {
        // The stats table mirrors the rule list only when filtering is on,
        // so a disabled engine reports no rules at all.
        let stats = if config.enable_event_filters {
            config
                .event_filters
                .iter()
                .map(|rule| FilterRuleStats {
                    rule_id: rule.id.clone(),
                    matched: 0,
                    removed: 0,
                    require_at_least_one_match: rule.require_at_least_one_match,
                    max_matches: rule.max_matches,
                    reason: rule.reason.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            enabled: config.enable_event_filters,
            rules: &config.event_filters,
            stats,
        }
    }

    /// Evaluates the rules against one event, in configured order.
    ///
    /// Returns the first matching rule (the event is to be dropped), `None`
    /// when nothing matches, or a fatal [`RuleViolation`] when a match
    /// pushes a rule past its ceiling.
    pub fn evaluate(
        &mut self,
        event: &SourceEvent,
        course_code: &str,
        start_local: &DateTime<Tz>,
        end_local: &DateTime<Tz>,
    ) -> Result<Option<FilterMatch>, RuleViolation> {
        if !self.enabled {
            return Ok(None);
        }

        for (rule, stats) in self.rules.iter().zip(self.stats.iter_mut()) {
            if !rule_matches(rule, event, course_code, start_local, end_local) {
                continue;
            }

            stats.matched += 1;
            if let Some(max) = rule.max_matches {
                if stats.matched > max {
                    return Err(RuleViolation::MaxMatchesExceeded {
                        rule_id: rule.id.clone(),
                        max,
                        title: event.title.clone(),
                        location: event.location.clone(),
                        start: start_local.format("%Y-%m-%d %H:%M").to_string(),
                        end: end_local.format("%Y-%m-%d %H:%M").to_string(),
                    });
                }
            }
            stats.removed += 1;

            tracing::debug!(rule_id = %rule.id, title = %event.title, "event dropped by filter rule");
            return Ok(Some(FilterMatch {
                rule_id: rule.id.clone(),
                reason: rule.reason.clone(),
            }));
        }

        Ok(None)
    }

    /// Post-pass check: every rule that required at least one match must
    /// have matched. Absence can only be known once the pass is complete.
    pub fn check_required_matches(&self) -> Result<(), RuleViolation> {
        for stats in &self.stats {
            if stats.require_at_least_one_match && stats.matched == 0 {
                return Err(RuleViolation::NeverMatched {
                    rule_id: stats.rule_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Hands the statistics table back once the pass is over.
    pub fn into_stats(self) -> Vec<FilterRuleStats> {
        self.stats
    }
}

/// True when every present predicate holds. Absent predicates match
/// unconditionally.
fn rule_matches(
    rule: &CompiledFilterRule,
    event: &SourceEvent,
    course_code: &str,
    start_local: &DateTime<Tz>,
    end_local: &DateTime<Tz>,
) -> bool {
    if let Some(code) = &rule.course_code {
        if code != course_code {
            return false;
        }
    }
    if let Some(needle) = &rule.title_contains {
        if !event.title.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(pattern) = &rule.title_regex {
        if !pattern.is_match(&event.title) {
            return false;
        }
    }
    if let Some(needle) = &rule.location_contains {
        if !event.location.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(pattern) = &rule.location_regex {
        if !pattern.is_match(&event.location) {
            return false;
        }
    }
    if let Some(weekday) = rule.weekday {
        if start_local.weekday().num_days_from_monday() != u32::from(weekday) {
            return false;
        }
    }
    if let Some(clock) = rule.start_time {
        if !clock.matches(start_local) {
            return false;
        }
    }
    if let Some(clock) = rule.end_time {
        if !clock.matches(end_local) {
            return false;
        }
    }
    true
}
