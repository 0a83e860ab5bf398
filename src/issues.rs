//! Issue import.
//!
//! `ilink issues import <file.json>` fills the issue table from a JSON array
//! exported from the tracker:
//!
//! ```json
//! [
//!   { "issue_key": "OBD-42", "summary": "Retry payments", "initiative": "Checkout v2", "squad": "Payments" }
//! ]
//! ```
//!
//! Rows with a malformed key are skipped with a warning and counted. An
//! existing key has its metadata refreshed.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::models::{Issue, IssueKey};
use crate::sqlite_store::SqliteStore;
use crate::store::IssueStore;

/// One row of an import file. The key is validated after parsing so a bad
/// row does not reject the whole file.
#[derive(Debug, Deserialize)]
pub struct IssueRecord {
    pub issue_key: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, alias = "initiative_name")]
    pub initiative: Option<String>,
    #[serde(default, alias = "squad_name")]
    pub squad: Option<String>,
}

impl IssueRecord {
    /// Convert to an [`Issue`], or `None` if the key is malformed.
    pub fn into_issue(self) -> Option<Issue> {
        let key = IssueKey::parse(self.issue_key.trim())?;
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Some(Issue {
            key,
            summary: clean(self.summary),
            initiative: clean(self.initiative),
            squad: clean(self.squad),
        })
    }
}

/// Counts from [`import_issues`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportTally {
    pub imported: usize,
    pub invalid: usize,
}

pub fn read_issue_file(path: &Path) -> Result<Vec<IssueRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read issue file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse issue file: {}", path.display()))
}

/// Validate and upsert each record. A store error aborts the import.
pub async fn import_issues<S>(store: &S, records: Vec<IssueRecord>) -> Result<ImportTally>
where
    S: IssueStore + ?Sized,
{
    let mut tally = ImportTally::default();
    for record in records {
        let raw_key = record.issue_key.clone();
        let Some(issue) = record.into_issue() else {
            warn!(key = %raw_key, "skipping row with malformed issue key");
            tally.invalid += 1;
            continue;
        };
        store
            .upsert_issue(&issue)
            .await
            .with_context(|| format!("storing issue {}", issue.key))?;
        tally.imported += 1;
    }
    Ok(tally)
}

/// Run `ilink issues import`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let records = read_issue_file(path)?;
    let rows = records.len();

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let tally = import_issues(&store, records).await?;

    println!("issues import {}", path.display());
    println!("  rows read: {}", rows);
    println!("  imported: {}", tally.imported);
    if tally.invalid > 0 {
        println!("  invalid keys skipped: {}", tally.invalid);
    }
    println!("ok");

    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn record(key: &str, squad: Option<&str>) -> IssueRecord {
        IssueRecord {
            issue_key: key.to_string(),
            summary: None,
            initiative: None,
            squad: squad.map(str::to_string),
        }
    }

    #[test]
    fn test_record_aliases() {
        let rows: Vec<IssueRecord> = serde_json::from_str(
            r#"[{"issue_key":"OBD-1","squad_name":"Payments","initiative_name":"Checkout"}]"#,
        )
        .unwrap();
        let issue = rows.into_iter().next().unwrap().into_issue().unwrap();
        assert_eq!(issue.squad.as_deref(), Some("Payments"));
        assert_eq!(issue.initiative.as_deref(), Some("Checkout"));
    }

    #[test]
    fn test_blank_metadata_dropped() {
        let issue = record(" OBD-7 ", Some("  ")).into_issue().unwrap();
        assert_eq!(issue.key.as_str(), "OBD-7");
        assert_eq!(issue.squad, None);
    }

    #[tokio::test]
    async fn test_invalid_keys_counted() {
        let store = InMemoryStore::new();
        let tally = import_issues(
            &store,
            vec![record("OBD-1", None), record("obd-2", None), record("", None)],
        )
        .await
        .unwrap();
        assert_eq!(tally, ImportTally { imported: 1, invalid: 2 });

        let issues = store.list_issues(10).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key.as_str(), "OBD-1");
    }
}
