//! Event types flowing through the split pipeline.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A single timed event from the source feed.
///
/// Immutable input: the pipeline only reads it. Instants are UTC; the parser
/// boundary has already resolved floating times into the configured zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Opaque identifier from the feed. May be empty.
    pub uid: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A retained event after classification and rewriting, assigned to an
/// output group.
#[derive(Debug, Clone, Serialize)]
pub struct TransformedEvent {
    pub uid: String,
    /// The output group this event lands in.
    pub short_code: String,
    pub start_local: DateTime<Tz>,
    pub end_local: DateTime<Tz>,
    /// Rewritten title: `"<short code> <type tag>"`.
    pub title: String,
    /// The extracted room token, or the raw location if none was found.
    pub location: String,
    /// Reassembled description carrying the original title, the sanitized
    /// description, and building/room lines.
    pub description: String,
}
