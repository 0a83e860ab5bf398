//! Idempotent persistence of document snapshots and mapping records.
//!
//! Every item is written on its own. A unique-key conflict means the row is
//! already there and counts as success; any other failure is logged, recorded
//! in the batch outcome, and the next item is processed. Running either
//! operation twice over the same input leaves the store unchanged the second
//! time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{chain_message, ItemError};
use crate::models::{Document, DocumentSnapshot, MappingCandidate, MappingRecord};
use crate::store::{MappingStore, WriteOutcome};

/// Per-document result of [`persist_documents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentWrite {
    Inserted(String),
    AlreadyPresent(String),
}

/// Outcome of persisting a batch of documents.
#[derive(Debug, Default)]
pub struct DocumentBatch {
    pub results: Vec<Result<DocumentWrite, ItemError>>,
    /// Documents with no resolvable identifier; never sent to the store.
    pub unresolved: usize,
}

impl DocumentBatch {
    /// Documents newly written by this call.
    pub fn persisted(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, Ok(DocumentWrite::Inserted(_))))
            .count()
    }

    pub fn already_present(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, Ok(DocumentWrite::AlreadyPresent(_))))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    /// Identifiers now present in the store, whether written now or before.
    pub fn stored_ids(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|r| match r {
                Ok(DocumentWrite::Inserted(id)) | Ok(DocumentWrite::AlreadyPresent(id)) => {
                    Some(id.clone())
                }
                Err(_) => None,
            })
            .collect()
    }
}

/// Snapshot and store each document.
pub async fn persist_documents<S>(
    store: &S,
    documents: &[Document],
    synced_at: DateTime<Utc>,
) -> DocumentBatch
where
    S: MappingStore + ?Sized,
{
    let mut batch = DocumentBatch::default();

    for doc in documents {
        let id = match doc.checked_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                batch.unresolved += 1;
                continue;
            }
            Err(err) => {
                warn!(error = %err, "document not saved");
                batch.results.push(Err(err));
                continue;
            }
        };
        let snapshot = DocumentSnapshot::from_document(doc, id.clone(), synced_at);
        let result = match store.upsert_document(&snapshot).await {
            Ok(WriteOutcome::Inserted) => Ok(DocumentWrite::Inserted(id)),
            Ok(WriteOutcome::Conflict) => Ok(DocumentWrite::AlreadyPresent(id)),
            Err(e) => {
                let err = ItemError::DocumentWrite {
                    id,
                    message: chain_message(&e),
                };
                warn!(error = %err, "document not saved");
                Err(err)
            }
        };
        batch.results.push(result);
    }

    debug!(
        persisted = batch.persisted(),
        already_present = batch.already_present(),
        failed = batch.failed(),
        "persisted documents"
    );
    batch
}

/// Tallies from [`persist_mappings`].
///
/// `created` and `skipped` are the authoritative success measure of a run.
/// `existing` counts pairs that were already mapped, `failed` counts
/// lookups or inserts that errored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MappingTally {
    pub created: usize,
    /// Candidates whose issue key has no issue row.
    pub skipped: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Resolve each candidate's issue and insert an `auto` mapping for it.
pub async fn persist_mappings<S>(store: &S, candidates: &[MappingCandidate]) -> MappingTally
where
    S: MappingStore + ?Sized,
{
    let mut tally = MappingTally::default();
    let now = Utc::now();

    for candidate in candidates {
        let issue_id = match store.lookup_issue_row_id(&candidate.issue_key).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(key = %candidate.issue_key, "no issue row for key");
                tally.skipped += 1;
                continue;
            }
            Err(e) => {
                let err = ItemError::IssueLookup {
                    key: candidate.issue_key.to_string(),
                    message: chain_message(&e),
                };
                warn!(error = %err, "mapping not created");
                tally.failed += 1;
                continue;
            }
        };

        let record = MappingRecord::auto(issue_id, candidate, now);
        match store.insert_mapping(&record).await {
            Ok(WriteOutcome::Inserted) => tally.created += 1,
            Ok(WriteOutcome::Conflict) => tally.existing += 1,
            Err(e) => {
                let err = ItemError::MappingWrite {
                    key: candidate.issue_key.to_string(),
                    document_id: candidate.document_id.clone(),
                    message: chain_message(&e),
                };
                warn!(error = %err, "mapping not created");
                tally.failed += 1;
            }
        }
    }

    debug!(
        created = tally.created,
        skipped = tally.skipped,
        existing = tally.existing,
        failed = tally.failed,
        "persisted mappings"
    );
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueKey, MappingOrigin, MatchType};
    use crate::store::memory::InMemoryStore;

    fn candidate(key: &str, doc: &str) -> MappingCandidate {
        MappingCandidate {
            issue_key: IssueKey::parse(key).unwrap(),
            document_id: doc.to_string(),
            document_url: Some(format!("https://notion.so/{}", doc)),
            document_title: "t".to_string(),
            match_type: MatchType::Content,
        }
    }

    #[tokio::test]
    async fn test_documents_second_pass_is_all_conflicts() {
        let store = InMemoryStore::new();
        let docs = vec![
            Document::new(Some("a"), Some("A"), "x"),
            Document::new(Some("b"), None, "y"),
        ];

        let first = persist_documents(&store, &docs, Utc::now()).await;
        assert_eq!(first.persisted(), 2);

        let second = persist_documents(&store, &docs, Utc::now()).await;
        assert_eq!(second.persisted(), 0);
        assert_eq!(second.already_present(), 2);
        assert_eq!(second.failed(), 0);
        assert_eq!(store.document_ids(), vec!["a", "b"]);
        assert_eq!(store.document("b").unwrap().title, "Untitled");
    }

    #[tokio::test]
    async fn test_document_failure_does_not_stop_batch() {
        let store = InMemoryStore::new().fail_document("a");
        let docs = vec![
            Document::new(Some("a"), None, ""),
            Document::new(Some("b"), None, ""),
        ];
        let batch = persist_documents(&store, &docs, Utc::now()).await;
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.persisted(), 1);
        assert_eq!(batch.stored_ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_mappings_created_then_existing() {
        let store = InMemoryStore::with_issue_keys(&["OBD-1", "OBD-2"]);
        let cands = vec![candidate("OBD-1", "p1"), candidate("OBD-2", "p1")];

        let first = persist_mappings(&store, &cands).await;
        assert_eq!(first.created, 2);
        assert_eq!(first.skipped, 0);

        let second = persist_mappings(&store, &cands).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.existing, 2);
        assert_eq!(second.skipped, 0);

        let record = store.mapping(1, "p1").unwrap();
        assert_eq!(record.origin, MappingOrigin::Auto);
        assert!(record.sync_enabled);
    }

    #[tokio::test]
    async fn test_missing_issue_is_skipped() {
        let store = InMemoryStore::with_issue_keys(&["OBD-1"]);
        let tally = persist_mappings(&store, &[candidate("OBD-9", "p1")]).await;
        assert_eq!(tally, MappingTally { skipped: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_lookup_failure_is_counted_not_raised() {
        let store = InMemoryStore::with_issue_keys(&["OBD-1", "OBD-2"]).fail_lookup("OBD-1");
        let tally =
            persist_mappings(&store, &[candidate("OBD-1", "p"), candidate("OBD-2", "p")]).await;
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.created, 1);
    }

    #[tokio::test]
    async fn test_mapping_insert_failure_is_counted_not_raised() {
        let store = InMemoryStore::with_issue_keys(&["OBD-1", "OBD-2"]).fail_mapping(1, "p");
        let tally =
            persist_mappings(&store, &[candidate("OBD-1", "p"), candidate("OBD-2", "p")]).await;
        assert_eq!(
            tally,
            MappingTally {
                created: 1,
                failed: 1,
                ..Default::default()
            }
        );
        assert_eq!(store.mapping_pairs(), vec![(2, "p".to_string())]);
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_stored() {
        let store = InMemoryStore::new();
        let docs = vec![
            Document::new(Some("bad id"), None, ""),
            Document::new(Some("good"), None, ""),
        ];
        let batch = persist_documents(&store, &docs, Utc::now()).await;
        assert_eq!(batch.failed(), 1);
        assert!(matches!(
            &batch.results[0],
            Err(ItemError::MalformedDocument { id }) if id == "bad id"
        ));
        assert_eq!(store.document_ids(), vec!["good"]);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let store = InMemoryStore::new();
        assert_eq!(persist_mappings(&store, &[]).await, MappingTally::default());
    }
}
