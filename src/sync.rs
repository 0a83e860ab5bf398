//! Sync orchestration.
//!
//! A run moves through fixed stages with no retries:
//!
//! ```text
//! FetchKnownIssues → FetchDocuments → Dedupe → ExtractAndMatch
//!     → PersistDocuments → PersistMappings → Summarize
//! ```
//!
//! Only the first stage can end a run: without the known issue keys nothing
//! can be matched, so a listing failure surfaces as [`SyncError::IssueFetch`].
//! Every later failure is confined to one term, document, or candidate and
//! shows up as a count in the [`SyncSummary`].
//!
//! [`reconcile`] is the storage half of the pipeline on its own. `ilink ingest`
//! uses it for search results fetched elsewhere.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dedup::dedupe_documents;
use crate::error::{chain_message, ItemError, SyncError};
use crate::matcher::{match_documents, MatchOutcome};
use crate::models::{Document, Issue, IssueKey};
use crate::persist::{persist_documents, persist_mappings, DocumentBatch, MappingTally};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::store::{IssueStore, MappingStore, StoreCounts};
use crate::terms::build_search_terms;
use crate::traits::DocumentSearch;

/// Pipeline stages, in execution order. Used to label log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    FetchKnownIssues,
    FetchDocuments,
    Dedupe,
    ExtractAndMatch,
    PersistDocuments,
    PersistMappings,
    Summarize,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::FetchKnownIssues => "fetch_known_issues",
            SyncStage::FetchDocuments => "fetch_documents",
            SyncStage::Dedupe => "dedupe",
            SyncStage::ExtractAndMatch => "extract_and_match",
            SyncStage::PersistDocuments => "persist_documents",
            SyncStage::PersistMappings => "persist_mappings",
            SyncStage::Summarize => "summarize",
        }
    }
}

/// How many terms to query and how long to wait between queries.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub max_terms: usize,
    pub pacing: Duration,
}

/// Documents gathered across all queried terms, duplicates included.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub documents: Vec<Document>,
    pub terms_queried: usize,
    pub terms_with_results: usize,
    /// Terms left out because of the cap.
    pub truncated: usize,
    pub failures: Vec<ItemError>,
}

/// Query `search` once per term, in order, up to `options.max_terms` terms.
///
/// Queries run one at a time with `options.pacing` between them. A failing
/// query contributes no documents; it is logged, reported, and recorded in
/// [`FetchOutcome::failures`].
pub async fn fetch_documents(
    search: &dyn DocumentSearch,
    terms: &[String],
    options: &FetchOptions,
    progress: &dyn SyncProgressReporter,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();

    let take = terms.len().min(options.max_terms);
    if take < terms.len() {
        outcome.truncated = terms.len() - take;
        info!(
            cap = options.max_terms,
            skipped = outcome.truncated,
            "search term cap reached"
        );
        progress.report(SyncProgressEvent::Truncated {
            cap: options.max_terms as u64,
            skipped: outcome.truncated as u64,
        });
    }

    for (i, term) in terms[..take].iter().enumerate() {
        if i > 0 && !options.pacing.is_zero() {
            tokio::time::sleep(options.pacing).await;
        }

        progress.report(SyncProgressEvent::Searching {
            term: term.clone(),
            n: (i + 1) as u64,
            total: take as u64,
        });
        outcome.terms_queried += 1;

        match search.search(term).await {
            Ok(mut docs) => {
                if !docs.is_empty() {
                    outcome.terms_with_results += 1;
                    progress.report(SyncProgressEvent::Found {
                        term: term.clone(),
                        pages: docs.len() as u64,
                    });
                }
                outcome.documents.append(&mut docs);
            }
            Err(e) => {
                let err = ItemError::Search {
                    term: term.clone(),
                    message: chain_message(&e),
                };
                warn!(provider = search.name(), error = %err, "search failed");
                progress.report(SyncProgressEvent::SearchFailed { term: term.clone() });
                outcome.failures.push(err);
            }
        }
    }

    outcome
}

/// Unique documents and the candidates they produce, before any write.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub documents: Vec<Document>,
    /// Documents dropped for lacking an identifier.
    pub unresolved: usize,
    pub matches: MatchOutcome,
}

/// Dedupe `documents`, then match the survivors against `known`.
pub fn plan(documents: Vec<Document>, known: &HashSet<IssueKey>) -> ReconcilePlan {
    let deduped = dedupe_documents(documents);
    info!(
        stage = SyncStage::Dedupe.as_str(),
        unique = deduped.documents.len(),
        unresolved = deduped.unresolved,
        "deduplicated documents"
    );

    let matches = match_documents(&deduped.documents, known);
    info!(
        stage = SyncStage::ExtractAndMatch.as_str(),
        candidates = matches.candidates.len(),
        failures = matches.failures.len(),
        "matched documents"
    );

    ReconcilePlan {
        documents: deduped.documents,
        unresolved: deduped.unresolved + matches.unresolved,
        matches,
    }
}

/// What [`reconcile`] did.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub unique_documents: usize,
    pub unresolved: usize,
    pub candidates: usize,
    pub match_failures: Vec<ItemError>,
    pub documents: DocumentBatch,
    pub mappings: MappingTally,
}

impl ReconcileOutcome {
    /// Identifiers of the documents now in the store.
    pub fn persisted_ids(&self) -> Vec<String> {
        self.documents.stored_ids()
    }
}

/// Write a plan: every unique document, then every candidate.
///
/// Documents are written even when nothing matched.
pub async fn apply<S>(
    store: &S,
    plan: ReconcilePlan,
    progress: &dyn SyncProgressReporter,
) -> ReconcileOutcome
where
    S: MappingStore + ?Sized,
{
    progress.report(SyncProgressEvent::Persisting {
        what: "pages",
        total: plan.documents.len() as u64,
    });
    let documents = persist_documents(store, &plan.documents, Utc::now()).await;
    info!(
        stage = SyncStage::PersistDocuments.as_str(),
        persisted = documents.persisted(),
        already_present = documents.already_present(),
        failed = documents.failed(),
        "stored documents"
    );

    progress.report(SyncProgressEvent::Persisting {
        what: "mappings",
        total: plan.matches.candidates.len() as u64,
    });
    let mappings = persist_mappings(store, &plan.matches.candidates).await;
    info!(
        stage = SyncStage::PersistMappings.as_str(),
        created = mappings.created,
        skipped = mappings.skipped,
        existing = mappings.existing,
        failed = mappings.failed,
        "stored mappings"
    );

    ReconcileOutcome {
        unique_documents: plan.documents.len(),
        unresolved: plan.unresolved,
        candidates: plan.matches.candidates.len(),
        match_failures: plan.matches.failures,
        documents,
        mappings,
    }
}

/// Dedupe, match, and persist a batch of fetched documents.
pub async fn reconcile<S>(
    store: &S,
    documents: Vec<Document>,
    known: &HashSet<IssueKey>,
    progress: &dyn SyncProgressReporter,
) -> ReconcileOutcome
where
    S: MappingStore + ?Sized,
{
    apply(store, plan(documents, known), progress).await
}

/// Load the known issues and return them with their key set.
///
/// # Errors
///
/// Returns [`SyncError::IssueFetch`] if the store cannot list issues.
pub async fn load_known_issues<S>(
    store: &S,
    limit: usize,
) -> Result<(Vec<Issue>, HashSet<IssueKey>), SyncError>
where
    S: IssueStore + ?Sized,
{
    let issues = store
        .list_issues(limit)
        .await
        .map_err(|e| SyncError::IssueFetch(chain_message(&e)))?;
    let known = issues.iter().map(|i| i.key.clone()).collect();
    Ok((issues, known))
}

/// Per-run overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Fetch and match, but write nothing.
    pub dry_run: bool,
    /// Replaces `sync.max_terms` for this run.
    pub max_terms: Option<usize>,
}

/// Result of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub issues_loaded: usize,
    pub terms_total: usize,
    pub terms_queried: usize,
    pub terms_truncated: usize,
    pub terms_failed: usize,
    /// Pages returned by all queries, duplicates included.
    pub pages_found: usize,
    pub unique_pages: usize,
    pub unresolved_pages: usize,
    pub candidates: usize,
    pub pages_saved: usize,
    pub pages_existing: usize,
    pub pages_failed: usize,
    pub mappings: MappingTally,
    /// Row totals after the run, also on runs that found no pages. Absent on
    /// dry runs or when counting failed.
    pub store_totals: Option<StoreCounts>,
}

impl SyncSummary {
    /// Print the summary to stdout.
    pub fn print(&self) {
        println!(
            "sync {}{}",
            self.provider,
            if self.dry_run { " (dry-run)" } else { "" }
        );
        println!("  run: {}", self.run_id);
        println!("  issues loaded: {}", self.issues_loaded);
        println!(
            "  terms queried: {} / {}",
            self.terms_queried, self.terms_total
        );
        if self.terms_truncated > 0 {
            println!("  terms not queried (cap): {}", self.terms_truncated);
        }
        if self.terms_failed > 0 {
            println!("  failed searches: {}", self.terms_failed);
        }
        println!("  pages found: {}", self.pages_found);
        println!("  unique pages: {}", self.unique_pages);
        println!("  candidate mappings: {}", self.candidates);

        if self.unique_pages == 0 {
            println!();
            println!("  no pages found. Check that:");
            println!("    - the integration token is valid");
            println!("    - pages are shared with the integration");
            println!("    - the search terms match page content");
        } else if !self.dry_run {
            println!("  pages saved: {}", self.pages_saved);
            if self.pages_existing > 0 {
                println!("  pages already stored: {}", self.pages_existing);
            }
            if self.pages_failed > 0 {
                println!("  pages failed: {}", self.pages_failed);
            }
            println!("  mappings created: {}", self.mappings.created);
            println!("  mappings skipped: {}", self.mappings.skipped);
            if self.mappings.existing > 0 {
                println!("  mappings already present: {}", self.mappings.existing);
            }
            if self.mappings.failed > 0 {
                println!("  mappings failed: {}", self.mappings.failed);
            }
            if self.candidates == 0 {
                println!("  no issue keys matched; pages were stored for later runs");
            }
        }

        if let Some(totals) = &self.store_totals {
            println!(
                "  totals: {} issues, {} pages, {} mappings",
                totals.issues, totals.documents, totals.mappings
            );
        }
        println!("ok");
    }
}

/// Run a full sync against `store` using `search`.
///
/// # Errors
///
/// Fails only when the known issues cannot be listed.
pub async fn run_sync<S>(
    config: &Config,
    store: &S,
    search: &dyn DocumentSearch,
    progress: &dyn SyncProgressReporter,
    options: &SyncOptions,
) -> Result<SyncSummary>
where
    S: IssueStore + MappingStore + ?Sized,
{
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    info!(%run_id, provider = search.name(), dry_run = options.dry_run, "sync started");

    progress.report(SyncProgressEvent::LoadingIssues);
    let (issues, known) = load_known_issues(store, config.sync.issue_limit).await?;
    progress.report(SyncProgressEvent::IssuesLoaded {
        count: issues.len() as u64,
    });
    info!(
        stage = SyncStage::FetchKnownIssues.as_str(),
        issues = issues.len(),
        "loaded known issues"
    );

    let terms = build_search_terms(&issues, &config.sync);
    let fetch_options = FetchOptions {
        max_terms: options.max_terms.unwrap_or(config.sync.max_terms),
        pacing: config.sync.pacing(),
    };
    let fetched = fetch_documents(search, &terms, &fetch_options, progress).await;
    info!(
        stage = SyncStage::FetchDocuments.as_str(),
        queried = fetched.terms_queried,
        pages = fetched.documents.len(),
        failed = fetched.failures.len(),
        "fetched documents"
    );

    let pages_found = fetched.documents.len();
    let planned = plan(fetched.documents, &known);

    let mut summary = SyncSummary {
        run_id,
        provider: search.name().to_string(),
        started_at,
        finished_at: started_at,
        dry_run: options.dry_run,
        issues_loaded: issues.len(),
        terms_total: terms.len(),
        terms_queried: fetched.terms_queried,
        terms_truncated: fetched.truncated,
        terms_failed: fetched.failures.len(),
        pages_found,
        unique_pages: planned.documents.len(),
        unresolved_pages: planned.unresolved,
        candidates: planned.matches.candidates.len(),
        pages_saved: 0,
        pages_existing: 0,
        pages_failed: 0,
        mappings: MappingTally::default(),
        store_totals: None,
    };

    if planned.documents.is_empty() || options.dry_run {
        if !options.dry_run {
            summary.store_totals = read_totals(store).await;
        }
        summary.finished_at = Utc::now();
        info!(
            stage = SyncStage::Summarize.as_str(),
            unique_pages = summary.unique_pages,
            "sync finished without writes"
        );
        return Ok(summary);
    }

    let outcome = apply(store, planned, progress).await;
    summary.pages_saved = outcome.documents.persisted();
    summary.pages_existing = outcome.documents.already_present();
    summary.pages_failed = outcome.documents.failed();
    summary.mappings = outcome.mappings;

    summary.store_totals = read_totals(store).await;
    summary.finished_at = Utc::now();
    info!(
        stage = SyncStage::Summarize.as_str(),
        created = summary.mappings.created,
        skipped = summary.mappings.skipped,
        "sync finished"
    );

    Ok(summary)
}

async fn read_totals<S>(store: &S) -> Option<StoreCounts>
where
    S: MappingStore + ?Sized,
{
    match store.counts().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            let message = chain_message(&e);
            warn!(error = %message, "could not read store totals");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        queried: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Scripted {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                queried: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl DocumentSearch for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn search(&self, term: &str) -> Result<Vec<Document>> {
            self.queried.lock().unwrap().push(term.to_string());
            if self.fail_on == Some(term) {
                anyhow::bail!("HTTP 502");
            }
            Ok(vec![Document::new(
                Some(&format!("page-{}", term)),
                Some(term),
                "",
            )])
        }
    }

    fn terms(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("T{}", i)).collect()
    }

    #[tokio::test]
    async fn test_fetch_respects_cap() {
        let search = Scripted::new(None);
        let options = FetchOptions {
            max_terms: 3,
            pacing: Duration::ZERO,
        };
        let outcome = fetch_documents(&search, &terms(5), &options, &NoProgress).await;
        assert_eq!(outcome.terms_queried, 3);
        assert_eq!(outcome.truncated, 2);
        assert_eq!(*search.queried.lock().unwrap(), vec!["T1", "T2", "T3"]);
    }

    #[tokio::test]
    async fn test_fetch_continues_after_failed_term() {
        let search = Scripted::new(Some("T2"));
        let options = FetchOptions {
            max_terms: 10,
            pacing: Duration::ZERO,
        };
        let outcome = fetch_documents(&search, &terms(3), &options, &NoProgress).await;
        assert_eq!(outcome.terms_queried, 3);
        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(&outcome.failures[0], ItemError::Search { term, .. } if term == "T2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_paces_between_queries() {
        let search = Scripted::new(None);
        let options = FetchOptions {
            max_terms: 10,
            pacing: Duration::from_millis(400),
        };
        let start = tokio::time::Instant::now();
        fetch_documents(&search, &terms(3), &options, &NoProgress).await;
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_run_sync_fails_when_issues_unavailable() {
        let store = InMemoryStore::new().fail_listing();
        let search = Scripted::new(None);
        let err = run_sync(
            &Config::with_db_path("unused.sqlite"),
            &store,
            &search,
            &NoProgress,
            &SyncOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.downcast_ref::<SyncError>().is_some());
        assert!(search.queried.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = InMemoryStore::with_issue_keys(&["OBD-1"]);
        let search = Scripted::new(None);
        let mut config = Config::with_db_path("unused.sqlite");
        config.sync.pacing_ms = 0;
        let summary = run_sync(
            &config,
            &store,
            &search,
            &NoProgress,
            &SyncOptions {
                dry_run: true,
                max_terms: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(summary.unique_pages, 1);
        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.pages_saved, 0);
        assert!(summary.store_totals.is_none());
        assert!(store.document_ids().is_empty());
    }

    #[tokio::test]
    async fn test_summary_serializes_to_json() {
        let store = InMemoryStore::with_issue_keys(&["OBD-1"]);
        let search = Scripted::new(None);
        let mut config = Config::with_db_path("unused.sqlite");
        config.sync.pacing_ms = 0;
        let summary = run_sync(&config, &store, &search, &NoProgress, &SyncOptions::default())
            .await
            .unwrap();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["run_id"], summary.run_id.to_string());
        assert_eq!(json["mappings"]["created"], 1);
        assert_eq!(json["store_totals"]["mappings"], 1);
    }
}
