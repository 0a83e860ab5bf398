//! Sync progress reporting.
//!
//! Reports observable progress during `ilink sync` so users see which terms
//! are being searched, how many pages came back, and when writes start.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncProgressEvent {
    /// Reading the known issues from the issue store.
    LoadingIssues,
    /// Known issues loaded.
    IssuesLoaded { count: u64 },
    /// Querying term `n` of `total`.
    Searching { term: String, n: u64, total: u64 },
    /// A query returned pages.
    Found { term: String, pages: u64 },
    /// A query failed; the run continues without its results.
    SearchFailed { term: String },
    /// The term cap was reached; `skipped` terms were not queried.
    Truncated { cap: u64, skipped: u64 },
    /// Writing snapshots or mappings.
    Persisting { what: &'static str, total: u64 },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the sync pipeline.
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress on stderr: "sync  searching  3 / 45  \"Checkout\"".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::LoadingIssues => "sync  loading issue keys...\n".to_string(),
            SyncProgressEvent::IssuesLoaded { count } => {
                format!("sync  {} issue keys loaded\n", format_number(*count))
            }
            SyncProgressEvent::Searching { term, n, total } => format!(
                "sync  searching  {} / {}  {:?}\n",
                format_number(*n),
                format_number(*total),
                term
            ),
            SyncProgressEvent::Found { term, pages } => {
                format!("sync  {:?}: {} pages found\n", term, format_number(*pages))
            }
            SyncProgressEvent::SearchFailed { term } => {
                format!("sync  {:?}: search failed, continuing\n", term)
            }
            SyncProgressEvent::Truncated { cap, skipped } => format!(
                "sync  limited search to {} terms ({} not queried)\n",
                format_number(*cap),
                format_number(*skipped)
            ),
            SyncProgressEvent::Persisting { what, total } => {
                format!("sync  saving {} {}\n", format_number(*total), what)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::LoadingIssues => serde_json::json!({
                "event": "progress",
                "phase": "loading_issues"
            }),
            SyncProgressEvent::IssuesLoaded { count } => serde_json::json!({
                "event": "progress",
                "phase": "issues_loaded",
                "count": count
            }),
            SyncProgressEvent::Searching { term, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "searching",
                "term": term,
                "n": n,
                "total": total
            }),
            SyncProgressEvent::Found { term, pages } => serde_json::json!({
                "event": "found",
                "term": term,
                "pages": pages
            }),
            SyncProgressEvent::SearchFailed { term } => serde_json::json!({
                "event": "search_failed",
                "term": term
            }),
            SyncProgressEvent::Truncated { cap, skipped } => serde_json::json!({
                "event": "truncated",
                "cap": cap,
                "skipped": skipped
            }),
            SyncProgressEvent::Persisting { what, total } => serde_json::json!({
                "event": "progress",
                "phase": "persisting",
                "what": what,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
