//! Cross-calendar conflict detection.
//!
//! Operates on all retained events across every output group combined: the
//! point is to flag a double-booking no matter which split calendar each
//! event lands in. Intervals are half-open `[start, end)`, so an event
//! ending exactly when another begins is not a conflict.

use serde::Serialize;

use crate::event::TransformedEvent;

/// Two retained events whose local time intervals overlap.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictPair {
    pub first: TransformedEvent,
    pub second: TransformedEvent,
}

/// Conflict detector output. `total` counts every overlapping pair exactly
/// once; `samples` stores at most the configured cap.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReport {
    pub total: u64,
    pub samples: Vec<ConflictPair>,
}

/// Finds every pair of events whose intervals intersect.
///
/// Sort by start ascending, then sweep with a working set of active events:
/// before each event, evict everything that ended at or before its start;
/// whatever remains overlaps it. One pass yields the exact total while the
/// stored sample list is capped at `sample_cap`.
pub fn find_conflicts<'a, I>(events: I, sample_cap: usize) -> ConflictReport
where
    I: IntoIterator<Item = &'a TransformedEvent>,
{
    let mut sorted: Vec<&TransformedEvent> = events.into_iter().collect();
    // Stable sort: ties keep their feed order.
    sorted.sort_by(|a, b| a.start_local.cmp(&b.start_local));

    let mut active: Vec<&TransformedEvent> = Vec::new();
    let mut total = 0u64;
    let mut samples = Vec::new();

    for event in sorted {
        active.retain(|candidate| candidate.end_local > event.start_local);
        for candidate in &active {
            total += 1;
            if samples.len() < sample_cap {
                samples.push(ConflictPair {
                    first: (*candidate).clone(),
                    second: event.clone(),
                });
            }
        }
        active.push(event);
    }

    ConflictReport { total, samples }
}
