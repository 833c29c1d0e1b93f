//! Location decomposition.
//!
//! Feed locations look like `"Realfagbygget, R1"`: building facility first,
//! room token last. The parser pulls the room out by testing the last
//! whitespace token against a fixed room pattern, scanning backward through
//! the remaining tokens when trailing punctuation or extra text gets in the
//! way.

use std::sync::LazyLock;

use regex::Regex;

/// 1-3 letters optionally, then 1-4 digits, optionally `-` and 1-4 more
/// digits. Covers tokens like `R1`, `F1`, `EL3`, `A4-112`, `302`.
static ROOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{0,3}\d{1,4}(?:-\d{1,4})?$").unwrap());

/// Result of splitting a location string into room and building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub room: String,
    pub building: String,
    /// False when no token matched the room pattern.
    pub ok: bool,
}

impl ParsedLocation {
    fn not_found(room: &str) -> Self {
        Self {
            room: room.to_string(),
            building: String::new(),
            ok: false,
        }
    }
}

/// Splits a free-text location into (room, building).
///
/// The last token is tried first since the room is reliably last; if it does
/// not match, the remaining tokens are scanned from the end backward. When
/// nothing matches, the whole trimmed string is returned as the room with
/// `ok = false` so the caller can report the parse failure.
pub fn parse_location(location: &str) -> ParsedLocation {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return ParsedLocation::not_found("");
    }

    // Tokens keep their position in the original string; commas are stripped
    // from token ends only.
    let tokens: Vec<&str> = trimmed
        .split_whitespace()
        .map(|token| token.trim_matches(','))
        .collect();

    let (last, rest) = match tokens.split_last() {
        Some(split) => split,
        None => return ParsedLocation::not_found(trimmed),
    };

    if !last.is_empty() && ROOM_RE.is_match(last) {
        return extract(location, last);
    }

    for token in rest.iter().rev() {
        if !token.is_empty() && ROOM_RE.is_match(token) {
            return extract(location, token);
        }
    }

    ParsedLocation::not_found(trimmed)
}

/// Builds the result once a room token is found: the building is everything
/// before the token's last occurrence, with the trailing comma and
/// whitespace stripped.
fn extract(location: &str, room: &str) -> ParsedLocation {
    let building = location.rfind(room).map_or("", |index| &location[..index]);
    let building = building.trim().trim_end_matches(',').trim();
    ParsedLocation {
        room: room.to_string(),
        building: building.to_string(),
        ok: true,
    }
}
