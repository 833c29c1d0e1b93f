//! Split configuration: the raw serde model and its compiled, validated form.
//!
//! The raw [`SplitConfig`] is what deserializes from the user's TOML. Nothing
//! in the pipeline consumes it directly; [`SplitConfig::compile`] validates
//! every field and compiles the regexes once, up front, so a malformed
//! pattern or clock time is rejected before any event is processed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors. All are detected before any event is
/// processed; a failing config refuses the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The course list was empty.
    #[error("no courses configured")]
    NoCourses,
    /// A course entry had an empty code.
    #[error("course code cannot be empty")]
    EmptyCourseCode,
    /// Two course entries shared the same code.
    #[error("duplicate course code: {code}")]
    DuplicateCourseCode { code: String },
    /// A course entry had an empty short code.
    #[error("course {code}: short code cannot be empty")]
    EmptyShortCode { code: String },
    /// A course's output file did not end in `.ics`.
    #[error("course {code}: output file {file:?} must end in .ics")]
    BadOutputFile { code: String, file: String },
    /// The default type tag was empty.
    #[error("default type tag cannot be empty")]
    EmptyDefaultType,
    /// A type rule pattern failed to compile.
    #[error("invalid type rule pattern for course {code}")]
    BadTypePattern {
        code: String,
        #[source]
        source: regex::Error,
    },
    /// The URL-removal pattern failed to compile.
    #[error("invalid mazemap URL pattern")]
    BadUrlPattern {
        #[source]
        source: regex::Error,
    },
    /// A filter rule was missing its id.
    #[error("filter rule #{index} is missing an id")]
    MissingRuleId { index: usize },
    /// Two filter rules shared the same id.
    #[error("duplicate filter rule id: {id}")]
    DuplicateRuleId { id: String },
    /// A filter rule's title or location regex failed to compile.
    #[error("filter rule {id}: invalid {field} pattern")]
    BadRulePattern {
        id: String,
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    /// A filter rule's weekday was outside 0-6.
    #[error("filter rule {id}: weekday must be 0-6 (Monday=0), got {weekday}")]
    WeekdayOutOfRange { id: String, weekday: u8 },
    /// A filter rule's start or end time was not `HH:MM`.
    #[error("filter rule {id}: {field} must be HH:MM, got {value:?}")]
    BadClockTime {
        id: String,
        field: &'static str,
        value: String,
    },
    /// A filter rule's match ceiling was below one.
    #[error("filter rule {id}: max_matches must be >= 1")]
    BadMaxMatches { id: String },
    /// The local timezone name did not resolve to an IANA zone.
    #[error("unknown timezone: {name}")]
    UnknownTimezone { name: String },
}

/// A course to split into its own output calendar.
///
/// Order matters: course classification scans this list in configured order
/// and the first code found in an event title wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSpec {
    /// The course code matched against event titles (e.g. `TDT4100`).
    pub code: String,
    /// Compact label used as output-group key and title prefix.
    pub short: String,
    /// Output file name for this course's calendar. Must end in `.ics`.
    pub file: String,
}

/// One ordered type rule: first pattern matching the title wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRuleSpec {
    /// Regex tested case-insensitively against the original title.
    pub pattern: String,
    /// Short type tag placed in the rewritten title (e.g. `f`, `ØF`).
    pub tag: String,
}

/// An exclusion rule. All present predicates must hold for a match; the
/// first matching rule drops the event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRuleSpec {
    /// Unique identifier, required. Shown in the report and in stats.
    pub id: String,
    /// Restrict the rule to one course code.
    #[serde(default)]
    pub course_code: Option<String>,
    /// Substring that must occur in the title.
    #[serde(default)]
    pub title_contains: Option<String>,
    /// Case-insensitive regex tested against the title.
    #[serde(default)]
    pub title_regex: Option<String>,
    /// Substring that must occur in the location.
    #[serde(default)]
    pub location_contains: Option<String>,
    /// Case-insensitive regex tested against the location.
    #[serde(default)]
    pub location_regex: Option<String>,
    /// Weekday of the local start time, 0=Monday through 6=Sunday.
    #[serde(default)]
    pub weekday: Option<u8>,
    /// Exact local start clock time, `HH:MM`.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Exact local end clock time, `HH:MM`.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Free text shown in the report when the rule drops an event.
    #[serde(default)]
    pub reason: Option<String>,
    /// Abort the run if this rule never matches.
    #[serde(default)]
    pub require_at_least_one_match: bool,
    /// Abort the run the moment the match count exceeds this ceiling.
    #[serde(default)]
    pub max_matches: Option<u64>,
}

/// User-facing split settings, as deserialized from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// IANA timezone all local-time predicates and report times use.
    pub local_timezone: String,
    /// Courses to split out, in classification order.
    pub courses: Vec<CourseSpec>,
    /// Ordered type rules per course code.
    pub type_rules: HashMap<String, Vec<TypeRuleSpec>>,
    /// Tag used when no type rule matches.
    pub default_type: String,
    /// Pattern for decorative map links stripped from descriptions.
    pub mazemap_url_regex: String,
    /// Master switch for the filter rule engine.
    pub enable_event_filters: bool,
    /// Ordered exclusion rules; first match wins.
    pub event_filters: Vec<FilterRuleSpec>,
    /// Whether to run the cross-calendar conflict detector.
    pub conflict_detector_enabled: bool,
    /// Cap on stored conflict sample pairs (the total is always exact).
    pub conflicts_show_max: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            local_timezone: "Europe/Oslo".to_string(),
            courses: Vec::new(),
            type_rules: HashMap::new(),
            default_type: "f".to_string(),
            mazemap_url_regex: r"https?://use\.mazemap\.com/\S+".to_string(),
            enable_event_filters: true,
            event_filters: Vec::new(),
            conflict_detector_enabled: true,
            conflicts_show_max: 10,
        }
    }
}

/// A wall-clock hour and minute, parsed from `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    /// True if the given instant falls on exactly this hour and minute.
    pub fn matches(self, dt: &DateTime<Tz>) -> bool {
        dt.hour() == self.hour && dt.minute() == self.minute
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Error type for malformed clock time strings.
#[derive(Debug, Clone, Error)]
#[error("invalid clock time: {0:?}")]
pub struct InvalidClockTime(String);

impl FromStr for ClockTime {
    type Err = InvalidClockTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidClockTime(s.to_string());
        let (hh, mm) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hh.parse().map_err(|_| invalid())?;
        let minute: u32 = mm.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

/// A type rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledTypeRule {
    pub pattern: Regex,
    pub tag: String,
}

/// A filter rule with patterns compiled and clock times parsed.
#[derive(Debug, Clone)]
pub struct CompiledFilterRule {
    pub id: String,
    pub course_code: Option<String>,
    pub title_contains: Option<String>,
    pub title_regex: Option<Regex>,
    pub location_contains: Option<String>,
    pub location_regex: Option<Regex>,
    /// 0=Monday through 6=Sunday, matching `Datelike::weekday` days from Monday.
    pub weekday: Option<u8>,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub reason: String,
    pub require_at_least_one_match: bool,
    pub max_matches: Option<u64>,
}

/// Validated, regex-compiled configuration threaded into every pipeline stage.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub timezone: Tz,
    pub courses: Vec<CourseSpec>,
    pub type_rules: HashMap<String, Vec<CompiledTypeRule>>,
    pub default_type: String,
    pub mazemap_url: Regex,
    pub enable_event_filters: bool,
    pub event_filters: Vec<CompiledFilterRule>,
    pub conflict_detector_enabled: bool,
    pub conflicts_show_max: usize,
}

/// Compiles a pattern case-insensitively, the way all configured patterns
/// are matched.
fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

impl SplitConfig {
    /// Validates the configuration and compiles all patterns.
    ///
    /// This is the fail-fast gate: every error here is reported before a
    /// single event is touched.
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        if self.courses.is_empty() {
            return Err(ConfigError::NoCourses);
        }

        let mut seen_codes = HashSet::new();
        for course in &self.courses {
            if course.code.trim().is_empty() {
                return Err(ConfigError::EmptyCourseCode);
            }
            if !seen_codes.insert(course.code.as_str()) {
                return Err(ConfigError::DuplicateCourseCode {
                    code: course.code.clone(),
                });
            }
            if course.short.is_empty() {
                return Err(ConfigError::EmptyShortCode {
                    code: course.code.clone(),
                });
            }
            if !course.file.ends_with(".ics") {
                return Err(ConfigError::BadOutputFile {
                    code: course.code.clone(),
                    file: course.file.clone(),
                });
            }
        }

        if self.default_type.is_empty() {
            return Err(ConfigError::EmptyDefaultType);
        }

        let timezone: Tz =
            self.local_timezone
                .parse()
                .map_err(|_| ConfigError::UnknownTimezone {
                    name: self.local_timezone.clone(),
                })?;

        let mut type_rules = HashMap::new();
        for (code, rules) in &self.type_rules {
            let compiled: Vec<CompiledTypeRule> = rules
                .iter()
                .map(|rule| {
                    Ok(CompiledTypeRule {
                        pattern: compile_pattern(&rule.pattern).map_err(|source| {
                            ConfigError::BadTypePattern {
                                code: code.clone(),
                                source,
                            }
                        })?,
                        tag: rule.tag.clone(),
                    })
                })
                .collect::<Result<_, ConfigError>>()?;
            type_rules.insert(code.clone(), compiled);
        }

        let mazemap_url = compile_pattern(&self.mazemap_url_regex)
            .map_err(|source| ConfigError::BadUrlPattern { source })?;

        let mut seen_ids = HashSet::new();
        let mut event_filters = Vec::with_capacity(self.event_filters.len());
        for (index, rule) in self.event_filters.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(ConfigError::MissingRuleId { index: index + 1 });
            }
            if !seen_ids.insert(rule.id.as_str()) {
                return Err(ConfigError::DuplicateRuleId {
                    id: rule.id.clone(),
                });
            }
            event_filters.push(compile_filter_rule(rule)?);
        }

        Ok(CompiledConfig {
            timezone,
            courses: self.courses.clone(),
            type_rules,
            default_type: self.default_type.clone(),
            mazemap_url,
            enable_event_filters: self.enable_event_filters,
            event_filters,
            conflict_detector_enabled: self.conflict_detector_enabled,
            conflicts_show_max: self.conflicts_show_max,
        })
    }
}

fn compile_filter_rule(rule: &FilterRuleSpec) -> Result<CompiledFilterRule, ConfigError> {
    let compile_rule_pattern = |pattern: &Option<String>, field: &'static str| {
        pattern
            .as_deref()
            .map(|p| {
                compile_pattern(p).map_err(|source| ConfigError::BadRulePattern {
                    id: rule.id.clone(),
                    field,
                    source,
                })
            })
            .transpose()
    };

    let parse_clock = |value: &Option<String>, field: &'static str| {
        value
            .as_deref()
            .map(|v| {
                v.parse::<ClockTime>()
                    .map_err(|_| ConfigError::BadClockTime {
                        id: rule.id.clone(),
                        field,
                        value: v.to_string(),
                    })
            })
            .transpose()
    };

    if let Some(weekday) = rule.weekday {
        if weekday > 6 {
            return Err(ConfigError::WeekdayOutOfRange {
                id: rule.id.clone(),
                weekday,
            });
        }
    }
    if rule.max_matches == Some(0) {
        return Err(ConfigError::BadMaxMatches {
            id: rule.id.clone(),
        });
    }

    Ok(CompiledFilterRule {
        id: rule.id.clone(),
        course_code: rule.course_code.clone(),
        title_contains: rule.title_contains.clone(),
        title_regex: compile_rule_pattern(&rule.title_regex, "title_regex")?,
        location_contains: rule.location_contains.clone(),
        location_regex: compile_rule_pattern(&rule.location_regex, "location_regex")?,
        weekday: rule.weekday,
        start_time: parse_clock(&rule.start_time, "start_time")?,
        end_time: parse_clock(&rule.end_time, "end_time")?,
        reason: rule
            .reason
            .clone()
            .unwrap_or_else(|| "filtered by event filter rule".to_string()),
        require_at_least_one_match: rule.require_at_least_one_match,
        max_matches: rule.max_matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(code: &str, short: &str) -> CourseSpec {
        CourseSpec {
            code: code.to_string(),
            short: short.to_string(),
            file: format!("{short}.ics"),
        }
    }

    fn minimal_config() -> SplitConfig {
        SplitConfig {
            courses: vec![course("TDT4100", "00")],
            ..SplitConfig::default()
        }
    }

    #[test]
    fn minimal_config_compiles() {
        let compiled = minimal_config().compile().expect("should compile");
        assert_eq!(compiled.timezone, chrono_tz::Europe::Oslo);
        assert_eq!(compiled.courses.len(), 1);
    }

    #[test]
    fn empty_course_list_rejected() {
        let config = SplitConfig::default();
        assert!(matches!(config.compile(), Err(ConfigError::NoCourses)));
    }

    #[test]
    fn duplicate_course_code_rejected() {
        let mut config = minimal_config();
        config.courses.push(course("TDT4100", "01"));
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DuplicateCourseCode { .. })
        ));
    }

    #[test]
    fn output_file_must_end_in_ics() {
        let mut config = minimal_config();
        config.courses[0].file = "00.txt".to_string();
        assert!(matches!(
            config.compile(),
            Err(ConfigError::BadOutputFile { .. })
        ));
    }

    #[test]
    fn malformed_type_rule_pattern_rejected() {
        let mut config = minimal_config();
        config.type_rules.insert(
            "TDT4100".to_string(),
            vec![TypeRuleSpec {
                pattern: "[unclosed".to_string(),
                tag: "f".to_string(),
            }],
        );
        assert!(matches!(
            config.compile(),
            Err(ConfigError::BadTypePattern { .. })
        ));
    }

    #[test]
    fn unknown_timezone_rejected() {
        let mut config = minimal_config();
        config.local_timezone = "Atlantis/Lost".to_string();
        assert!(matches!(
            config.compile(),
            Err(ConfigError::UnknownTimezone { .. })
        ));
    }

    #[test]
    fn duplicate_filter_rule_id_rejected() {
        let mut config = minimal_config();
        let rule = FilterRuleSpec {
            id: "r1".to_string(),
            ..FilterRuleSpec::default()
        };
        config.event_filters = vec![rule.clone(), rule];
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DuplicateRuleId { .. })
        ));
    }

    #[test]
    fn missing_filter_rule_id_rejected() {
        let mut config = minimal_config();
        config.event_filters = vec![FilterRuleSpec::default()];
        assert!(matches!(
            config.compile(),
            Err(ConfigError::MissingRuleId { index: 1 })
        ));
    }

    #[test]
    fn weekday_out_of_range_rejected() {
        let mut config = minimal_config();
        config.event_filters = vec![FilterRuleSpec {
            id: "r1".to_string(),
            weekday: Some(7),
            ..FilterRuleSpec::default()
        }];
        assert!(matches!(
            config.compile(),
            Err(ConfigError::WeekdayOutOfRange { weekday: 7, .. })
        ));
    }

    #[test]
    fn zero_max_matches_rejected() {
        let mut config = minimal_config();
        config.event_filters = vec![FilterRuleSpec {
            id: "r1".to_string(),
            max_matches: Some(0),
            ..FilterRuleSpec::default()
        }];
        assert!(matches!(
            config.compile(),
            Err(ConfigError::BadMaxMatches { .. })
        ));
    }

    #[test]
    fn clock_time_parses_and_validates() {
        let t: ClockTime = "12:15".parse().expect("should parse");
        assert_eq!((t.hour, t.minute), (12, 15));
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("12:60".parse::<ClockTime>().is_err());
        assert!("noon".parse::<ClockTime>().is_err());
    }

    #[test]
    fn malformed_clock_time_in_rule_rejected() {
        let mut config = minimal_config();
        config.event_filters = vec![FilterRuleSpec {
            id: "r1".to_string(),
            start_time: Some("12.15".to_string()),
            ..FilterRuleSpec::default()
        }];
        assert!(matches!(
            config.compile(),
            Err(ConfigError::BadClockTime { .. })
        ));
    }
}
