//! Error types for the reconciliation pipeline.
//!
//! Application-level failures travel as `anyhow::Error`. The two enums here
//! cover the places where the kind of failure matters to the caller:
//! [`ItemError`] for a single document, candidate, or search term that was
//! skipped while the batch carried on, and [`SyncError`] for the failures
//! that end a run.

use thiserror::Error;

/// A failure confined to one item of a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("document {id:?} has a malformed identifier")]
    MalformedDocument { id: String },

    #[error("storing document {id}: {message}")]
    DocumentWrite { id: String, message: String },

    #[error("looking up issue {key}: {message}")]
    IssueLookup { key: String, message: String },

    #[error("mapping {key} -> {document_id}: {message}")]
    MappingWrite {
        key: String,
        document_id: String,
        message: String,
    },

    #[error("search for {term:?} failed: {message}")]
    Search { term: String, message: String },
}

/// A failure that aborts a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Without the known issue keys nothing can be matched.
    #[error("could not fetch known issues: {0}")]
    IssueFetch(String),
}

/// Render an `anyhow` chain on a single line for item-level reporting.
pub(crate) fn chain_message(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
