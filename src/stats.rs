//! Database statistics and mapping coverage.
//!
//! `ilink stats` prints row totals so a user can tell whether syncs are
//! landing. `ilink coverage` breaks issues down by squad and shows how many
//! have at least one enabled mapping.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::store::MappingStore;

/// Squads at or above this share of mapped issues are marked as covered.
pub const COVERED_THRESHOLD: i64 = 50;

/// Coverage for one squad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquadCoverage {
    pub squad: String,
    pub total_issues: i64,
    pub mapped_issues: i64,
}

impl SquadCoverage {
    pub fn percentage(&self) -> i64 {
        coverage_percentage(self.mapped_issues, self.total_issues)
    }

    pub fn is_covered(&self) -> bool {
        self.percentage() >= COVERED_THRESHOLD
    }
}

/// Rounded share of `mapped` in `total`, 0 when `total` is 0.
pub fn coverage_percentage(mapped: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (mapped * 100 + total / 2) / total
}

/// Run the stats command: count rows and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let counts = store.counts().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("issue-linker: database stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Issues:      {}", counts.issues);
    println!("  Pages:       {}", counts.documents);
    println!("  Mappings:    {}", counts.mappings);

    let last_sync: Option<i64> = sqlx::query_scalar("SELECT MAX(last_synced_at) FROM documents")
        .fetch_one(store.pool())
        .await?;
    println!(
        "  Last sync:   {}",
        last_sync
            .map(format_ts_iso)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();

    store.close().await;
    Ok(())
}

/// Per-squad coverage, largest squads first. Issues without a squad are
/// grouped under `(none)`.
pub async fn squad_coverage(store: &SqliteStore) -> Result<Vec<SquadCoverage>> {
    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(i.squad_name, '(none)') AS squad,
            COUNT(*) AS total_issues,
            SUM(CASE WHEN EXISTS (
                SELECT 1 FROM issue_document_mappings m
                WHERE m.issue_id = i.id AND m.sync_enabled = 1
            ) THEN 1 ELSE 0 END) AS mapped_issues
        FROM issues i
        GROUP BY squad
        ORDER BY total_issues DESC, squad ASC
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    Ok(rows
        .iter()
        .map(|row| SquadCoverage {
            squad: row.get("squad"),
            total_issues: row.get("total_issues"),
            mapped_issues: row.get("mapped_issues"),
        })
        .collect())
}

/// Run the coverage command.
pub async fn run_coverage(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let coverage = squad_coverage(&store).await?;

    println!("Coverage by squad");
    if coverage.is_empty() {
        println!("  no issues imported yet");
    } else {
        println!(
            "  {:<28} {:>8} {:>8} {:>6}",
            "SQUAD", "MAPPED", "ISSUES", "%"
        );
        println!("  {}", "-".repeat(54));
        for c in &coverage {
            println!(
                "  {:<28} {:>8} {:>8} {:>5}%{}",
                c.squad,
                c.mapped_issues,
                c.total_issues,
                c.percentage(),
                if c.is_covered() { "" } else { "  (low)" }
            );
        }
    }
    println!();

    store.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use crate::models::{Issue, IssueKey, MappingRecord, MappingOrigin};
    use crate::store::IssueStore;
    use tempfile::TempDir;

    #[test]
    fn test_coverage_percentage() {
        assert_eq!(coverage_percentage(0, 0), 0);
        assert_eq!(coverage_percentage(1, 3), 33);
        assert_eq!(coverage_percentage(2, 3), 67);
        assert_eq!(coverage_percentage(5, 10), 50);
    }

    #[test]
    fn test_threshold() {
        let squad = |mapped| SquadCoverage {
            squad: "Payments".into(),
            total_issues: 4,
            mapped_issues: mapped,
        };
        assert!(squad(2).is_covered());
        assert!(!squad(1).is_covered());
    }

    #[tokio::test]
    async fn test_squad_coverage_counts_enabled_mappings() {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_db_path(tmp.path().join("ilink.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        apply_schema(&pool).await.unwrap();
        let store = SqliteStore::new(pool);

        for (key, squad) in [("OBD-1", Some("Payments")), ("OBD-2", Some("Payments")), ("APM-1", None)] {
            let mut issue = Issue::new(IssueKey::parse(key).unwrap());
            issue.squad = squad.map(str::to_string);
            store.upsert_issue(&issue).await.unwrap();
        }
        let obd1 = store
            .lookup_issue_row_id(&IssueKey::parse("OBD-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        for doc in ["p1", "p2"] {
            store
                .insert_mapping(&MappingRecord {
                    issue_id: obd1,
                    document_id: doc.to_string(),
                    document_url: None,
                    origin: MappingOrigin::Auto,
                    sync_enabled: true,
                    created_at: chrono::Utc::now(),
                })
                .await
                .unwrap();
        }

        let coverage = squad_coverage(&store).await.unwrap();
        assert_eq!(
            coverage,
            vec![
                SquadCoverage {
                    squad: "Payments".into(),
                    total_issues: 2,
                    mapped_issues: 1
                },
                SquadCoverage {
                    squad: "(none)".into(),
                    total_issues: 1,
                    mapped_issues: 0
                },
            ]
        );
        store.close().await;
    }
}
