//! In-memory [`IssueStore`] + [`MappingStore`] for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Individual writes
//! can be made to fail so tests can exercise the skip-and-continue paths of
//! the persister and the fatal path of the orchestrator.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{DocumentSnapshot, Issue, IssueKey, MappingRecord};

use super::{IssueStore, MappingStore, StoreCounts, WriteOutcome};

struct StoredIssue {
    row_id: i64,
    issue: Issue,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    issues: RwLock<Vec<StoredIssue>>,
    documents: RwLock<HashMap<String, DocumentSnapshot>>,
    mappings: RwLock<HashMap<(i64, String), MappingRecord>>,
    failing_documents: HashSet<String>,
    failing_lookups: HashSet<String>,
    failing_mappings: HashSet<(i64, String)>,
    fail_listing: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            issues: RwLock::new(Vec::new()),
            documents: RwLock::new(HashMap::new()),
            mappings: RwLock::new(HashMap::new()),
            failing_documents: HashSet::new(),
            failing_lookups: HashSet::new(),
            failing_mappings: HashSet::new(),
            fail_listing: false,
        }
    }

    /// A store pre-loaded with one issue row per key, row ids starting at 1.
    pub fn with_issue_keys(keys: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut issues = store.issues.write().unwrap();
            for (i, k) in keys.iter().enumerate() {
                let key = IssueKey::parse(k).unwrap_or_else(|| panic!("bad test key {}", k));
                issues.push(StoredIssue {
                    row_id: i as i64 + 1,
                    issue: Issue::new(key),
                });
            }
        }
        store
    }

    /// Make `upsert_document` fail for this document id.
    pub fn fail_document(mut self, id: &str) -> Self {
        self.failing_documents.insert(id.to_string());
        self
    }

    /// Make `lookup_issue_row_id` fail for this key.
    pub fn fail_lookup(mut self, key: &str) -> Self {
        self.failing_lookups.insert(key.to_string());
        self
    }

    /// Make `insert_mapping` fail for this `(issue_id, document_id)` pair.
    pub fn fail_mapping(mut self, issue_id: i64, document_id: &str) -> Self {
        self.failing_mappings
            .insert((issue_id, document_id.to_string()));
        self
    }

    /// Make `list_issues` fail.
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn document(&self, id: &str) -> Option<DocumentSnapshot> {
        self.documents.read().unwrap().get(id).cloned()
    }

    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All mappings as `(issue_id, document_id)`, sorted.
    pub fn mapping_pairs(&self) -> Vec<(i64, String)> {
        let mut pairs: Vec<(i64, String)> = self.mappings.read().unwrap().keys().cloned().collect();
        pairs.sort();
        pairs
    }

    pub fn mapping(&self, issue_id: i64, document_id: &str) -> Option<MappingRecord> {
        self.mappings
            .read()
            .unwrap()
            .get(&(issue_id, document_id.to_string()))
            .cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IssueStore for InMemoryStore {
    async fn list_issues(&self, limit: usize) -> Result<Vec<Issue>> {
        if self.fail_listing {
            bail!("issue listing unavailable");
        }
        let issues = self.issues.read().unwrap();
        Ok(issues.iter().take(limit).map(|s| s.issue.clone()).collect())
    }

    async fn upsert_issue(&self, issue: &Issue) -> Result<()> {
        let mut issues = self.issues.write().unwrap();
        if let Some(existing) = issues.iter_mut().find(|s| s.issue.key == issue.key) {
            existing.issue = issue.clone();
        } else {
            let row_id = issues.len() as i64 + 1;
            issues.push(StoredIssue {
                row_id,
                issue: issue.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MappingStore for InMemoryStore {
    async fn upsert_document(&self, snapshot: &DocumentSnapshot) -> Result<WriteOutcome> {
        if self.failing_documents.contains(&snapshot.id) {
            bail!("write rejected for document {}", snapshot.id);
        }
        let mut docs = self.documents.write().unwrap();
        if docs.contains_key(&snapshot.id) {
            return Ok(WriteOutcome::Conflict);
        }
        docs.insert(snapshot.id.clone(), snapshot.clone());
        Ok(WriteOutcome::Inserted)
    }

    async fn lookup_issue_row_id(&self, key: &IssueKey) -> Result<Option<i64>> {
        if self.failing_lookups.contains(key.as_str()) {
            bail!("lookup failed for {}", key);
        }
        let issues = self.issues.read().unwrap();
        Ok(issues.iter().find(|s| &s.issue.key == key).map(|s| s.row_id))
    }

    async fn insert_mapping(&self, record: &MappingRecord) -> Result<WriteOutcome> {
        let pair = (record.issue_id, record.document_id.clone());
        if self.failing_mappings.contains(&pair) {
            bail!("write rejected for mapping {} -> {}", pair.0, pair.1);
        }
        let mut mappings = self.mappings.write().unwrap();
        if mappings.contains_key(&pair) {
            return Ok(WriteOutcome::Conflict);
        }
        mappings.insert(pair, record.clone());
        Ok(WriteOutcome::Inserted)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            issues: self.issues.read().unwrap().len() as i64,
            documents: self.documents.read().unwrap().len() as i64,
            mappings: self.mappings.read().unwrap().len() as i64,
        })
    }
}
