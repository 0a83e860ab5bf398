//! Reconcile search results fetched outside of `ilink`.
//!
//! `ilink ingest <results.json>` reads hits saved from another search tool
//! and runs them through the same dedupe → match → persist pipeline as a sync,
//! without any HTTP. The file holds either a JSON array of hits or an object
//! with a `results` array. Hits are loosely shaped:
//!
//! | Document field | Hit fields, first present wins |
//! |----------------|--------------------------------|
//! | `id` | `id` (else the page handle in the URL) |
//! | `url` | `url`, `href` |
//! | `title` | `title` |
//! | `body` | `content` |
//! | `excerpt` | `highlight` |
//! | `properties` | `properties` |
//!
//! Only `content` is scanned for issue keys. Search tools fill `highlight`
//! with the query term, so a key there says nothing about the page. When
//! present, the highlight is stored as the snapshot text.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::connector_notion::non_empty_str;
use crate::db;
use crate::models::Document;
use crate::progress::NoProgress;
use crate::sqlite_store::SqliteStore;
use crate::sync::{load_known_issues, reconcile};

/// Read a results file into documents.
pub fn load_hits(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    let json: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse results file: {}", path.display()))?;

    let hits = match &json {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => match json.get("results").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => bail!("results file has no \"results\" array: {}", path.display()),
        },
        _ => bail!("results file must hold a JSON array: {}", path.display()),
    };

    Ok(hits.iter().map(hit_to_document).collect())
}

/// Adapt one loosely shaped search hit.
pub fn hit_to_document(hit: &Value) -> Document {
    let first = |fields: &[&str]| fields.iter().find_map(|f| non_empty_str(hit.get(*f)));

    Document {
        id: first(&["id"]),
        url: first(&["url", "href"]),
        title: first(&["title"]),
        body: first(&["content"]).unwrap_or_default(),
        excerpt: first(&["highlight"]),
        database_id: None,
        page_type: first(&["type"]).unwrap_or_else(|| "page".to_string()),
        properties: hit
            .get("properties")
            .filter(|p| p.is_object())
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})),
        raw: hit.clone(),
    }
}

/// Run `ilink ingest`.
pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let documents = load_hits(path)?;
    let hits = documents.len();

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let (issues, known) = match load_known_issues(&store, config.sync.issue_limit).await {
        Ok(loaded) => loaded,
        Err(e) => {
            store.close().await;
            return Err(e.into());
        }
    };
    let outcome = reconcile(&store, documents, &known, &NoProgress).await;

    println!("ingest {}", path.display());
    println!("  issue keys: {}", issues.len());
    println!("  hits read: {}", hits);
    println!("  unique pages: {}", outcome.unique_documents);
    if outcome.unresolved > 0 {
        println!("  pages without id: {}", outcome.unresolved);
    }
    println!("  pages saved: {}", outcome.documents.persisted());
    if outcome.documents.failed() > 0 {
        println!("  pages failed: {}", outcome.documents.failed());
    }
    println!("  candidate mappings: {}", outcome.candidates);
    println!("  mappings created: {}", outcome.mappings.created);
    println!("  mappings skipped: {}", outcome.mappings.skipped);
    if outcome.mappings.existing > 0 {
        println!("  mappings already present: {}", outcome.mappings.existing);
    }
    if outcome.mappings.failed > 0 {
        println!("  mappings failed: {}", outcome.mappings.failed);
    }
    println!("ok");

    store.close().await;
    Ok(())
}
