//! Reconciliation behaviour through the public API, against the in-memory
//! store and a scripted search client.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use issue_linker::config::Config;
use issue_linker::error::SyncError;
use issue_linker::extract::extract_issue_keys;
use issue_linker::models::{Document, IssueKey, MatchType};
use issue_linker::persist::MappingTally;
use issue_linker::progress::NoProgress;
use issue_linker::store::memory::InMemoryStore;
use issue_linker::sync::{plan, reconcile, run_sync, SyncOptions};
use issue_linker::traits::DocumentSearch;

fn keys(list: &[&str]) -> HashSet<IssueKey> {
    list.iter().map(|k| IssueKey::parse(k).unwrap()).collect()
}

/// Returns canned pages per term and remembers what was asked.
struct ScriptedSearch {
    pages: HashMap<String, Vec<Document>>,
    queried: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    fn new(pages: Vec<(&str, Vec<Document>)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(term, docs)| (term.to_string(), docs))
                .collect(),
            queried: Mutex::new(Vec::new()),
        }
    }

    fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSearch for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, term: &str) -> Result<Vec<Document>> {
        self.queried.lock().unwrap().push(term.to_string());
        Ok(self.pages.get(term).cloned().unwrap_or_default())
    }
}

fn test_config() -> Config {
    let mut config = Config::with_db_path("unused.sqlite");
    config.sync.pacing_ms = 0;
    config
}

#[test]
fn test_extracted_keys_are_well_formed_and_unique() {
    let text = "OBD-1, OBD-1 and APM-22; lower obd-3, long ABCDEFGHIJK-1, mixed Ab-2, edge X-1 and ZZ-0";
    let found = extract_issue_keys(Some(text));
    let strs: Vec<&str> = found.iter().map(IssueKey::as_str).collect();
    assert_eq!(strs, vec!["OBD-1", "APM-22", "ZZ-0"]);
    for key in &found {
        assert!(IssueKey::parse(key.as_str()).is_some());
    }
}

#[tokio::test]
async fn test_roadmap_scenario() {
    let store = InMemoryStore::with_issue_keys(&["OBD-1", "OBD-2"]);
    let docs = vec![Document::new(Some("p1"), Some("Roadmap"), "See OBD-1 and XYZ-9")];

    let outcome = reconcile(&store, docs, &keys(&["OBD-1", "OBD-2"]), &NoProgress).await;

    assert_eq!(outcome.candidates, 1);
    assert_eq!(outcome.persisted_ids(), vec!["p1"]);
    assert_eq!(outcome.mappings.created, 1);
    assert_eq!(outcome.mappings.skipped, 0);
    assert_eq!(store.mapping_pairs(), vec![(1, "p1".to_string())]);
}

#[test]
fn test_title_outranks_content() {
    let docs = vec![Document::new(Some("p1"), Some("OBD-42"), "OBD-42")];
    let planned = plan(docs, &keys(&["OBD-42"]));
    assert_eq!(planned.matches.candidates.len(), 1);
    assert_eq!(planned.matches.candidates[0].match_type, MatchType::Title);
}

#[tokio::test]
async fn test_empty_known_set_still_stores_documents() {
    let store = InMemoryStore::new();
    let docs = vec![Document::new(Some("p1"), Some("OBD-1"), "APM-2")];

    let outcome = reconcile(&store, docs, &HashSet::new(), &NoProgress).await;

    assert_eq!(outcome.candidates, 0);
    assert_eq!(outcome.mappings, MappingTally::default());
    assert_eq!(store.document_ids(), vec!["p1"]);
}

#[tokio::test]
async fn test_document_without_identifier_yields_nothing() {
    let store = InMemoryStore::with_issue_keys(&["OBD-1"]);
    let docs = vec![Document::new(None, Some("OBD-1"), "OBD-1").with_url("https://notion.so/x")];

    let outcome = reconcile(&store, docs, &keys(&["OBD-1"]), &NoProgress).await;

    assert_eq!(outcome.unresolved, 1);
    assert_eq!(outcome.candidates, 0);
    assert!(store.document_ids().is_empty());
}

#[tokio::test]
async fn test_second_reconcile_reports_existing_not_skipped() {
    let store = InMemoryStore::with_issue_keys(&["OBD-1"]);
    let docs = vec![Document::new(Some("p1"), None, "OBD-1")];
    let known = keys(&["OBD-1"]);

    reconcile(&store, docs.clone(), &known, &NoProgress).await;
    let second = reconcile(&store, docs, &known, &NoProgress).await;

    assert_eq!(second.documents.persisted(), 0);
    assert_eq!(second.documents.already_present(), 1);
    assert_eq!(second.documents.failed(), 0);
    assert_eq!(
        second.mappings,
        MappingTally {
            existing: 1,
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn test_run_sync_queries_exactly_cap_terms() {
    let store = InMemoryStore::with_issue_keys(&["OBD-1", "OBD-2", "OBD-3", "OBD-4"]);
    let search = ScriptedSearch::new(vec![(
        "OBD-1",
        vec![Document::new(Some("p1"), Some("Plan"), "OBD-1 OBD-3")],
    )]);

    let summary = run_sync(
        &test_config(),
        &store,
        &search,
        &NoProgress,
        &SyncOptions {
            dry_run: false,
            max_terms: Some(2),
        },
    )
    .await
    .unwrap();

    assert_eq!(search.queried(), vec!["OBD-1", "OBD-2"]);
    assert_eq!(summary.terms_queried, 2);
    assert_eq!(summary.terms_truncated, 2);
    assert_eq!(summary.pages_saved, 1);
    assert_eq!(summary.mappings.created, 2);
    let totals = summary.store_totals.unwrap();
    assert_eq!(totals.documents, 1);
    assert_eq!(totals.mappings, 2);
}

#[tokio::test]
async fn test_run_sync_dedupes_pages_across_terms() {
    let store = InMemoryStore::with_issue_keys(&["OBD-1", "OBD-2"]);
    let page = |title: &str| Document::new(Some("shared"), Some(title), "OBD-1 OBD-2");
    let search = ScriptedSearch::new(vec![
        ("OBD-1", vec![page("first")]),
        ("OBD-2", vec![page("second")]),
    ]);

    let summary = run_sync(&test_config(), &store, &search, &NoProgress, &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.pages_found, 2);
    assert_eq!(summary.unique_pages, 1);
    assert_eq!(summary.mappings.created, 2);
    assert_eq!(store.document("shared").unwrap().title, "second");
}

#[tokio::test]
async fn test_run_sync_with_no_pages_completes_early() {
    let store = InMemoryStore::with_issue_keys(&["OBD-1"]);
    let search = ScriptedSearch::new(Vec::new());

    let summary = run_sync(&test_config(), &store, &search, &NoProgress, &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.unique_pages, 0);
    assert_eq!(summary.mappings, MappingTally::default());
    let totals = summary.store_totals.unwrap();
    assert_eq!(totals.issues, 1);
    assert_eq!(totals.documents, 0);
    assert_eq!(totals.mappings, 0);
}

#[tokio::test]
async fn test_run_sync_aborts_when_issue_listing_fails() {
    let store = InMemoryStore::new().fail_listing();
    let search = ScriptedSearch::new(Vec::new());

    let err = run_sync(&test_config(), &store, &search, &NoProgress, &SyncOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::IssueFetch(_))
    ));
    assert!(search.queried().is_empty());
}
