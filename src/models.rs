//! Core data models used throughout issue-linker.
//!
//! These types represent the issues, documents, and mappings that flow
//! through the reconciliation pipeline. Loosely shaped search-API payloads
//! are adapted into [`Document`] at the connector boundary, so everything
//! past that point works with total, typed records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ItemError;
use crate::extract::{find_page_handle, is_issue_key};

/// Title stored for documents that arrive without one.
pub const UNTITLED: &str = "Untitled";

/// A tracker issue identifier such as `OBD-42`.
///
/// Always matches `[A-Z]{2,10}-\d+`. Equality is exact, case-sensitive
/// string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    /// Validate and wrap a key. Returns `None` unless the whole string is a key.
    pub fn parse(s: &str) -> Option<Self> {
        is_issue_key(s).then(|| Self(s.to_string()))
    }

    /// Wrap a string the caller has already matched against the key pattern.
    pub(crate) fn new_unchecked(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for IssueKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        IssueKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid issue key: {:?}", raw)))
    }
}

/// An issue row as listed by the issue store.
///
/// Only the key takes part in matching; the rest feeds search-term
/// generation and coverage reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: IssueKey,
    pub summary: Option<String>,
    pub initiative: Option<String>,
    pub squad: Option<String>,
}

impl Issue {
    pub fn new(key: IssueKey) -> Self {
        Self {
            key,
            summary: None,
            initiative: None,
            squad: None,
        }
    }
}

/// A page returned by the document search, already adapted from the raw
/// API payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Explicit page identifier, when the payload carried one.
    pub id: Option<String>,
    /// Page URL; may embed the 32-hex page handle.
    pub url: Option<String>,
    pub title: Option<String>,
    /// Text scanned for issue keys.
    pub body: String,
    /// Search-result excerpt kept as the snapshot text in place of `body`.
    /// Never scanned: search tools often echo the query term here.
    pub excerpt: Option<String>,
    /// Parent database, for pages that live in a database.
    pub database_id: Option<String>,
    pub page_type: String,
    /// Structured page properties as returned by the API.
    pub properties: serde_json::Value,
    /// The untouched search hit.
    pub raw: serde_json::Value,
}

impl Document {
    /// A page with only an id, title, and body. Used by adapters and tests.
    pub fn new(id: Option<&str>, title: Option<&str>, body: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            url: None,
            title: title.map(str::to_string),
            body: body.to_string(),
            excerpt: None,
            database_id: None,
            page_type: "page".to_string(),
            properties: serde_json::json!({}),
            raw: serde_json::json!({}),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Resolve the identifier this document is stored under.
    ///
    /// Prefers the explicit id; otherwise scans the URL for a 32-character
    /// lowercase hex handle. `None` means the document cannot be keyed.
    pub fn resolved_id(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
        self.url
            .as_deref()
            .and_then(find_page_handle)
            .map(str::to_string)
    }

    /// [`resolved_id`](Self::resolved_id), rejecting identifiers that cannot
    /// be used as a storage key (whitespace or control characters).
    pub fn checked_id(&self) -> Result<Option<String>, ItemError> {
        match self.resolved_id() {
            Some(id) if id.chars().any(|c| c.is_whitespace() || c.is_control()) => {
                Err(ItemError::MalformedDocument { id })
            }
            other => Ok(other),
        }
    }

    pub fn title_or_untitled(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED)
    }
}

/// Durable copy of a [`Document`], keyed by its resolved identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    pub database_id: Option<String>,
    pub page_type: String,
    pub properties_json: String,
    pub raw_json: String,
    pub last_synced_at: DateTime<Utc>,
}

impl DocumentSnapshot {
    pub fn from_document(doc: &Document, id: String, synced_at: DateTime<Utc>) -> Self {
        let page_type = if doc.page_type.trim().is_empty() {
            "page".to_string()
        } else {
            doc.page_type.clone()
        };
        Self {
            id,
            url: doc.url.clone(),
            title: doc.title_or_untitled().to_string(),
            content: doc.excerpt.clone().unwrap_or_else(|| doc.body.clone()),
            database_id: doc.database_id.clone(),
            page_type,
            properties_json: doc.properties.to_string(),
            raw_json: doc.raw.to_string(),
            last_synced_at: synced_at,
        }
    }
}

/// Where in a document an issue key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Title,
    Content,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Title => "title",
            MatchType::Content => "content",
        }
    }
}

/// A proposed issue↔document association, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingCandidate {
    pub issue_key: IssueKey,
    pub document_id: String,
    pub document_url: Option<String>,
    pub document_title: String,
    pub match_type: MatchType,
}

/// Who created a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    /// Discovered by a sync run.
    Auto,
    /// Created by a person; never produced by this crate.
    Manual,
}

impl MappingOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingOrigin::Auto => "auto",
            MappingOrigin::Manual => "manual",
        }
    }
}

/// A persisted issue↔document association. Unique per `(issue_id, document_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRecord {
    pub issue_id: i64,
    pub document_id: String,
    pub document_url: Option<String>,
    pub origin: MappingOrigin,
    pub sync_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl MappingRecord {
    /// An enabled, system-generated mapping for `candidate`.
    pub fn auto(issue_id: i64, candidate: &MappingCandidate, created_at: DateTime<Utc>) -> Self {
        Self {
            issue_id,
            document_id: candidate.document_id.clone(),
            document_url: candidate.document_url.clone(),
            origin: MappingOrigin::Auto,
            sync_enabled: true,
            created_at,
        }
    }
}
