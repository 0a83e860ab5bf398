//! Collapse documents fetched by several search terms into a unique set.
//!
//! The same page usually comes back for more than one query. Pages are keyed
//! by their resolved identifier: the latest fetch replaces earlier ones, while
//! the page keeps the position where it first appeared.

use std::collections::HashMap;

use crate::models::Document;

/// Unique documents plus the number dropped for lacking an identifier.
#[derive(Debug, Default)]
pub struct Deduped {
    pub documents: Vec<Document>,
    pub unresolved: usize,
}

/// Keep one document per resolved identifier, last fetch wins.
pub fn dedupe_documents(documents: Vec<Document>) -> Deduped {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut out = Deduped::default();

    for doc in documents {
        let Some(id) = doc.resolved_id() else {
            out.unresolved += 1;
            continue;
        };
        match position.get(&id) {
            Some(&i) => out.documents[i] = doc,
            None => {
                position.insert(id, out.documents.len());
                out.documents.push(doc);
            }
        }
    }

    out
}
