//! Description sanitization.
//!
//! Strips decorative map links from event descriptions and tidies up the
//! whitespace scars they leave behind. The cleanup steps are order-sensitive:
//! link removal first, then the dangling-colon collapse, then whitespace and
//! newline normalization, then a final trim.

use std::sync::LazyLock;

use regex::Regex;

/// `"Rom: https://..."` minus the link leaves `"Rom: \n"`; collapse the
/// dangling colon line to a bare newline.
static DANGLING_COLON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*:[ \t]*\n").unwrap());

static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static MULTI_NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Removes all matches of `url_pattern` from the text and normalizes the
/// residue. Returns the cleaned text and whether anything was removed.
pub fn sanitize_description(text: &str, url_pattern: &Regex) -> (String, bool) {
    if text.is_empty() {
        return (String::new(), false);
    }

    let without_links = url_pattern.replace_all(text, "");
    let removed = without_links != text;

    let cleaned = DANGLING_COLON_RE.replace_all(&without_links, "\n");
    let cleaned = MULTI_SPACE_RE.replace_all(&cleaned, " ");
    let cleaned = MULTI_NEWLINE_RE.replace_all(&cleaned, "\n\n");

    (cleaned.trim().to_string(), removed)
}
