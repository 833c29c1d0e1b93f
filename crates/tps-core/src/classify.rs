//! Course and type classification.
//!
//! Course classification is plain substring containment over the configured
//! course list, in configured order. Type classification runs the course's
//! ordered regex rules case-insensitively, falling back to the global
//! default tag.

use crate::config::{CompiledConfig, CourseSpec};

/// Returns the first configured course whose code occurs in the title.
///
/// Configuration order is the iteration order; this is part of the contract,
/// not an accident of the list type.
pub fn classify_course<'a>(title: &str, courses: &'a [CourseSpec]) -> Option<&'a CourseSpec> {
    if title.is_empty() {
        return None;
    }
    courses.iter().find(|course| title.contains(&course.code))
}

/// Returns the type tag for a (course, title) pair and whether the global
/// default was used.
///
/// The first matching rule in the course's ordered list wins. A course with
/// no rules, or no matching rule, yields the default tag.
pub fn classify_type<'a>(
    config: &'a CompiledConfig,
    course_code: &str,
    title: &str,
) -> (&'a str, bool) {
    let rules = config
        .type_rules
        .get(course_code)
        .map_or(&[][..], Vec::as_slice);
    for rule in rules {
        if rule.pattern.is_match(title) {
            return (&rule.tag, false);
        }
    }
    (&config.default_type, true)
}
