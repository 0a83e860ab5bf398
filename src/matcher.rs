//! Reference matching: documents × known issue keys → mapping candidates.
//!
//! Each document's title and body are scanned separately for issue keys.
//! A key produces a candidate only when it belongs to the known set. A key
//! seen in the title is tagged [`MatchType::Title`] even when the body also
//! mentions it, so every `(document, key)` pair yields at most one candidate.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::ItemError;
use crate::extract::extract_issue_keys;
use crate::models::{Document, IssueKey, MappingCandidate, MatchType};

/// Candidates produced from a batch, plus the documents that could not be
/// processed.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub candidates: Vec<MappingCandidate>,
    /// Documents skipped because no identifier could be resolved.
    pub unresolved: usize,
    pub failures: Vec<ItemError>,
}

/// Match every document against `known`.
///
/// Documents without a resolvable identifier contribute nothing. A document
/// that fails to process is recorded in [`MatchOutcome::failures`] and the
/// rest of the batch still runs. Candidates keep input document order.
pub fn match_documents(documents: &[Document], known: &HashSet<IssueKey>) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for doc in documents {
        match match_document(doc, known) {
            Ok(Some(mut candidates)) => outcome.candidates.append(&mut candidates),
            Ok(None) => outcome.unresolved += 1,
            Err(e) => {
                warn!(error = %e, "skipping document");
                outcome.failures.push(e);
            }
        }
    }

    debug!(
        documents = documents.len(),
        candidates = outcome.candidates.len(),
        "matched documents"
    );
    outcome
}

/// Match a single document. `Ok(None)` means the document has no identifier.
pub fn match_document(
    doc: &Document,
    known: &HashSet<IssueKey>,
) -> Result<Option<Vec<MappingCandidate>>, ItemError> {
    let Some(document_id) = doc.checked_id()? else {
        return Ok(None);
    };

    let content_keys = extract_issue_keys(Some(&doc.body));
    let title_keys = extract_issue_keys(doc.title.as_deref());
    let in_title: HashSet<&IssueKey> = title_keys.iter().collect();

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for key in content_keys.iter().chain(title_keys.iter()) {
        if !seen.insert(key) || !known.contains(key) {
            continue;
        }
        let match_type = if in_title.contains(key) {
            MatchType::Title
        } else {
            MatchType::Content
        };
        candidates.push(MappingCandidate {
            issue_key: key.clone(),
            document_id: document_id.clone(),
            document_url: doc.url.clone(),
            document_title: doc.title_or_untitled().to_string(),
            match_type,
        });
    }

    Ok(Some(candidates))
}
