//! VEVENT extraction from raw iCalendar text.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tps_core::SourceEvent;

use crate::IcsError;

/// One content line split into name, parameters and value.
struct ContentLine<'a> {
    name: &'a str,
    params: Vec<(&'a str, &'a str)>,
    value: &'a str,
}

/// Parses an iCalendar document into source events.
///
/// `default_tz` resolves floating (zone-less) datetimes; the feed's report
/// and filters work in that zone anyway. Missing text properties become
/// empty strings; missing DTSTART/DTEND is an error.
pub fn parse_calendar(text: &str, default_tz: Tz) -> Result<Vec<SourceEvent>, IcsError> {
    if !text.contains("BEGIN:VCALENDAR") {
        return Err(IcsError::NotCalendar);
    }

    let unfolded = unfold(text);
    let mut events = Vec::new();
    let mut lines = unfolded.iter();

    while let Some(line) = lines.next() {
        if line.trim() != "BEGIN:VEVENT" {
            continue;
        }

        let mut uid = String::new();
        let mut summary = String::new();
        let mut location = String::new();
        let mut description = String::new();
        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;
        let mut terminated = false;

        for line in lines.by_ref() {
            if line.trim() == "END:VEVENT" {
                terminated = true;
                break;
            }
            let Some(content) = split_content_line(line) else {
                continue;
            };
            match content.name.to_ascii_uppercase().as_str() {
                "UID" => uid = unescape(content.value),
                "SUMMARY" => summary = unescape(content.value),
                "LOCATION" => location = unescape(content.value),
                "DESCRIPTION" => description = unescape(content.value),
                "DTSTART" => start = Some(parse_datetime(&content, "DTSTART", default_tz)?),
                "DTEND" => end = Some(parse_datetime(&content, "DTEND", default_tz)?),
                _ => {}
            }
        }

        if !terminated {
            return Err(IcsError::UnterminatedEvent);
        }

        let start = start.ok_or_else(|| IcsError::MissingProperty {
            uid: uid.clone(),
            property: "DTSTART",
        })?;
        let end = end.ok_or_else(|| IcsError::MissingProperty {
            uid: uid.clone(),
            property: "DTEND",
        })?;

        events.push(SourceEvent {
            uid,
            title: summary,
            location,
            description,
            start,
            end,
        });
    }

    Ok(events)
}

/// Undoes RFC 5545 line folding: a line starting with a space or tab
/// continues the previous one.
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Splits `NAME;PARAM=VALUE;...:value`. Returns `None` for lines without a
/// colon (garbage the feed sometimes contains).
fn split_content_line(line: &str) -> Option<ContentLine<'_>> {
    let colon = line.find(':')?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);

    let mut parts = head.split(';');
    let name = parts.next()?;
    let params = parts
        .filter_map(|param| {
            let (key, val) = param.split_once('=')?;
            Some((key, val.trim_matches('"')))
        })
        .collect();

    Some(ContentLine {
        name,
        params,
        value,
    })
}

fn parse_datetime(
    content: &ContentLine<'_>,
    property: &'static str,
    default_tz: Tz,
) -> Result<DateTime<Utc>, IcsError> {
    let value = content.value.trim();
    let bad = || IcsError::BadDateTime {
        property,
        value: value.to_string(),
    };

    // UTC form: 20260105T111500Z
    if let Some(stripped) = value.strip_suffix('Z') {
        let naive =
            NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let tz = match param(content, "TZID") {
        Some(tzid) => tzid.parse::<Tz>().map_err(|_| IcsError::UnknownTzid {
            tzid: tzid.to_string(),
        })?,
        None => default_tz,
    };

    // Local form: 20260105T121500 with TZID, or floating.
    if value.contains('T') {
        let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
        return Ok(resolve_local(naive, tz).with_timezone(&Utc));
    }

    // Date-only form (VALUE=DATE): local midnight.
    let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| bad())?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(bad)?;
    Ok(resolve_local(midnight, tz).with_timezone(&Utc))
}

fn param<'a>(content: &ContentLine<'a>, key: &str) -> Option<&'a str> {
    content
        .params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}

/// Resolves a naive local time in a zone. Ambiguous times (DST fall-back)
/// take the earlier candidate; nonexistent times are shifted one hour past
/// the gap.
fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
            LocalResult::None => tz.from_utc_datetime(&naive),
        },
    }
}

/// Undoes RFC 5545 text escaping.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Oslo;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//NTNU//TP//EN\r\n\
BEGIN:VEVENT\r\n\
UID:tp-1@example.org\r\n\
DTSTART:20260105T111500Z\r\n\
DTEND:20260105T130000Z\r\n\
SUMMARY:TDT4100 Forelesning\r\n\
LOCATION:Realfagbygget\\, R1\r\n\
DESCRIPTION:Rom: https://use.mazemap.com/abc\\nPensum \r\n kap 3\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn parses_a_folded_escaped_feed() {
        let events = parse_calendar(FEED, Oslo).expect("should parse");
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.uid, "tp-1@example.org");
        assert_eq!(event.title, "TDT4100 Forelesning");
        assert_eq!(event.location, "Realfagbygget, R1");
        // Folded line rejoined, \n unescaped.
        assert_eq!(
            event.description,
            "Rom: https://use.mazemap.com/abc\nPensum kap 3"
        );
        assert_eq!(
            event.start,
            Utc.with_ymd_and_hms(2026, 1, 5, 11, 15, 0).single().unwrap()
        );
    }

    #[test]
    fn tzid_datetimes_resolve_in_their_zone() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n\
DTSTART;TZID=Europe/Oslo:20260105T121500\n\
DTEND;TZID=Europe/Oslo:20260105T140000\n\
END:VEVENT\nEND:VCALENDAR\n";
        let events = parse_calendar(text, Oslo).expect("should parse");
        // 12:15 Oslo in winter is 11:15 UTC.
        assert_eq!(
            events[0].start,
            Utc.with_ymd_and_hms(2026, 1, 5, 11, 15, 0).single().unwrap()
        );
    }

    #[test]
    fn floating_datetimes_use_the_default_zone() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n\
DTSTART:20260105T121500\nDTEND:20260105T140000\n\
END:VEVENT\nEND:VCALENDAR\n";
        let events = parse_calendar(text, Oslo).expect("should parse");
        assert_eq!(
            events[0].start,
            Utc.with_ymd_and_hms(2026, 1, 5, 11, 15, 0).single().unwrap()
        );
    }

    #[test]
    fn date_only_values_become_local_midnight() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n\
DTSTART;VALUE=DATE:20260105\nDTEND;VALUE=DATE:20260106\n\
END:VEVENT\nEND:VCALENDAR\n";
        let events = parse_calendar(text, Oslo).expect("should parse");
        assert_eq!(
            events[0].start,
            Utc.with_ymd_and_hms(2026, 1, 4, 23, 0, 0).single().unwrap()
        );
    }

    #[test]
    fn non_calendar_text_is_rejected() {
        let err = parse_calendar("<html>log in</html>", Oslo).expect_err("should fail");
        assert!(matches!(err, IcsError::NotCalendar));
    }

    #[test]
    fn missing_dtend_is_an_error() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n\
DTSTART:20260105T111500Z\nEND:VEVENT\nEND:VCALENDAR\n";
        let err = parse_calendar(text, Oslo).expect_err("should fail");
        assert!(matches!(
            err,
            IcsError::MissingProperty {
                property: "DTEND",
                ..
            }
        ));
    }

    #[test]
    fn unknown_tzid_is_an_error() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n\
DTSTART;TZID=Atlantis/Lost:20260105T121500\nDTEND:20260105T140000Z\n\
END:VEVENT\nEND:VCALENDAR\n";
        let err = parse_calendar(text, Oslo).expect_err("should fail");
        assert!(matches!(err, IcsError::UnknownTzid { .. }));
    }

    #[test]
    fn unterminated_event_is_an_error() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\n";
        let err = parse_calendar(text, Oslo).expect_err("should fail");
        assert!(matches!(err, IcsError::UnterminatedEvent));
    }

    #[test]
    fn unknown_properties_and_blocks_are_skipped() {
        let text = "BEGIN:VCALENDAR\n\
BEGIN:VTIMEZONE\nTZID:Europe/Oslo\nEND:VTIMEZONE\n\
BEGIN:VEVENT\nUID:x\nSEQUENCE:0\nSTATUS:CONFIRMED\n\
DTSTART:20260105T111500Z\nDTEND:20260105T130000Z\n\
END:VEVENT\nEND:VCALENDAR\n";
        let events = parse_calendar(text, Oslo).expect("should parse");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "");
    }
}
