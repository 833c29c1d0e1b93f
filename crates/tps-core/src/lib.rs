//! Core splitting pipeline for the timetable calendar splitter.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: mapping event titles to courses and type tags
//! - Filtering: ordered exclusion rules with match-count guarantees
//! - Transformation: rewriting titles, locations and descriptions
//! - Conflict detection: overlapping events across all output calendars
//!
//! The crate performs no I/O: it consumes pre-parsed events and a compiled
//! configuration, and hands back plain data.

pub mod classify;
pub mod config;
pub mod conflict;
pub mod event;
pub mod filter;
pub mod location;
pub mod report;
pub mod sanitize;
pub mod transform;

pub use conflict::{ConflictPair, ConflictReport, find_conflicts};
pub use config::{
    CompiledConfig, ConfigError, CourseSpec, FilterRuleSpec, SplitConfig, TypeRuleSpec,
};
pub use event::{SourceEvent, TransformedEvent};
pub use filter::{FilterRuleStats, RuleViolation};
pub use report::{ChangeFlags, ReportRecord, SplitSummary, summarize};
pub use transform::{SplitOutcome, split_events};
