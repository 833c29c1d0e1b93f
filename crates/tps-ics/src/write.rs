//! Serialization of transformed events back to iCalendar text.

use chrono::{DateTime, Utc};
use tps_core::TransformedEvent;

/// Maximum content line length in octets before folding, per RFC 5545.
const FOLD_AT: usize = 75;

/// Serializes one output calendar.
///
/// `generated_at` becomes each event's DTSTAMP; the caller passes the run
/// time so tests can pin it.
pub fn write_calendar(events: &[TransformedEvent], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, "PRODID:-//tpsplit//EN");
    push_line(&mut out, "CALSCALE:GREGORIAN");

    for event in events {
        push_line(&mut out, "BEGIN:VEVENT");
        if !event.uid.is_empty() {
            push_line(&mut out, &format!("UID:{}", escape(&event.uid)));
        }
        push_line(
            &mut out,
            &format!("DTSTAMP:{}", format_utc(generated_at)),
        );
        push_line(
            &mut out,
            &format!(
                "DTSTART:{}",
                format_utc(event.start_local.with_timezone(&Utc))
            ),
        );
        push_line(
            &mut out,
            &format!("DTEND:{}", format_utc(event.end_local.with_timezone(&Utc))),
        );
        push_line(&mut out, &format!("SUMMARY:{}", escape(&event.title)));
        if !event.location.is_empty() {
            push_line(&mut out, &format!("LOCATION:{}", escape(&event.location)));
        }
        if !event.description.is_empty() {
            push_line(
                &mut out,
                &format!("DESCRIPTION:{}", escape(&event.description)),
            );
        }
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// RFC 5545 text escaping: backslash first, then the characters that would
/// otherwise terminate or split the value.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            ';' => out.push_str(r"\;"),
            ',' => out.push_str(r"\,"),
            '\n' => out.push_str(r"\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Appends a content line, folded at 75 octets with CRLF terminators.
/// Folds only at char boundaries so multi-byte text stays intact.
fn push_line(out: &mut String, line: &str) {
    let mut remaining = line;
    let mut first = true;
    loop {
        let budget = if first { FOLD_AT } else { FOLD_AT - 1 };
        if remaining.len() <= budget {
            if !first {
                out.push(' ');
            }
            out.push_str(remaining);
            out.push_str("\r\n");
            return;
        }

        let mut split = budget;
        while !remaining.is_char_boundary(split) {
            split -= 1;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(&remaining[..split]);
        out.push_str("\r\n");
        remaining = &remaining[split..];
        first = false;
    }
}
