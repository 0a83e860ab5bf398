//! Storage abstraction for issue-linker.
//!
//! Two traits split the durable side of a sync run:
//!
//! - [`IssueStore`] lists the tracked issues (the known-key universe) and
//!   accepts imported issue rows.
//! - [`MappingStore`] holds document snapshots and issue↔document mappings.
//!
//! [`SqliteStore`](crate::sqlite_store::SqliteStore) implements both on top of
//! SQLite; [`memory::InMemoryStore`] implements both for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes. A store
//! handle is opened once by the caller and passed to every component that
//! needs it.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{DocumentSnapshot, Issue, IssueKey, MappingRecord};

/// Result of an insert-or-ignore write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was written.
    Inserted,
    /// The unique key already existed; nothing changed.
    Conflict,
}

/// Row totals, reported at the end of a sync and by `ilink stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub issues: i64,
    pub documents: i64,
    pub mappings: i64,
}

/// Source of the known issue keys.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// List up to `limit` issues in storage order.
    async fn list_issues(&self, limit: usize) -> Result<Vec<Issue>>;

    /// Insert an issue, or refresh its metadata if the key already exists.
    async fn upsert_issue(&self, issue: &Issue) -> Result<()>;
}

/// Durable home of document snapshots and mapping records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document`](MappingStore::upsert_document) | Insert a snapshot unless its id exists |
/// | [`lookup_issue_row_id`](MappingStore::lookup_issue_row_id) | Resolve a key to its row id |
/// | [`insert_mapping`](MappingStore::insert_mapping) | Insert a mapping unless the pair exists |
/// | [`counts`](MappingStore::counts) | Row totals |
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Insert a snapshot keyed by its id. An existing id is a
    /// [`WriteOutcome::Conflict`], not an error, and is left untouched.
    async fn upsert_document(&self, snapshot: &DocumentSnapshot) -> Result<WriteOutcome>;

    /// Internal row id of the issue with this key, if any.
    async fn lookup_issue_row_id(&self, key: &IssueKey) -> Result<Option<i64>>;

    /// Insert a mapping. An existing `(issue_id, document_id)` pair is a
    /// [`WriteOutcome::Conflict`].
    async fn insert_mapping(&self, record: &MappingRecord) -> Result<WriteOutcome>;

    async fn counts(&self) -> Result<StoreCounts>;
}
