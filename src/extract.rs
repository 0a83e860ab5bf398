//! Issue-key extraction from free text.
//!
//! Finds every substring shaped like a tracker key (`OBD-42`, `APM-7`) in a
//! block of text. Keys are 2–10 uppercase ASCII letters, a hyphen, and one or
//! more ASCII digits, delimited by word boundaries.
//!
//! Also hosts the page-handle scanner used to recover a document identifier
//! from a URL when the search hit carried no explicit id.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::IssueKey;

static ISSUE_KEY_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,10}-[0-9]+\b").expect("issue key pattern compiles"));

static ISSUE_KEY_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,10}-[0-9]+$").expect("issue key pattern compiles"));

static PAGE_HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-f0-9]{32}").expect("page handle pattern compiles"));

/// Extract the distinct issue keys mentioned in `text`.
///
/// Absent or empty input yields an empty vector. The result never contains
/// duplicates; keys appear in the order they were first seen, although
/// callers should only rely on uniqueness.
///
/// # Example
///
/// ```rust
/// use issue_linker::extract::extract_issue_keys;
///
/// let keys = extract_issue_keys(Some("See OBD-1, OBD-1 again and XYZ-9"));
/// let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
/// assert_eq!(keys, vec!["OBD-1", "XYZ-9"]);
/// ```
pub fn extract_issue_keys(text: Option<&str>) -> Vec<IssueKey> {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for m in ISSUE_KEY_IN_TEXT.find_iter(text) {
        if seen.insert(m.as_str()) {
            keys.push(IssueKey::new_unchecked(m.as_str()));
        }
    }
    keys
}

/// Whether `candidate` is, in its entirety, a well-formed issue key.
pub fn is_issue_key(candidate: &str) -> bool {
    ISSUE_KEY_EXACT.is_match(candidate)
}

/// Find the first 32-character lowercase hex run in a URL-like string.
///
/// Notion page URLs end in the page id with hyphens stripped, e.g.
/// `https://www.notion.so/Roadmap-0123456789abcdef0123456789abcdef`.
pub fn find_page_handle(url: &str) -> Option<&str> {
    PAGE_HANDLE.find(url).map(|m| m.as_str())
}
