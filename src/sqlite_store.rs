//! SQLite-backed [`IssueStore`] and [`MappingStore`].
//!
//! Snapshot and mapping writes use `INSERT ... ON CONFLICT DO NOTHING`; a
//! statement that touches no row is reported as [`WriteOutcome::Conflict`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{DocumentSnapshot, Issue, IssueKey, MappingRecord};
use crate::store::{IssueStore, MappingStore, StoreCounts, WriteOutcome};

/// SQLite implementation of the store traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the underlying pool.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn write_outcome(rows_affected: u64) -> WriteOutcome {
    if rows_affected == 0 {
        WriteOutcome::Conflict
    } else {
        WriteOutcome::Inserted
    }
}

#[async_trait]
impl IssueStore for SqliteStore {
    async fn list_issues(&self, limit: usize) -> Result<Vec<Issue>> {
        let rows = sqlx::query(
            "SELECT issue_key, summary, initiative_name, squad_name FROM issues ORDER BY id ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut issues = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw_key: String = row.get("issue_key");
            // Rows are only written through IssueKey, but the table may be
            // filled by other tools.
            let Some(key) = IssueKey::parse(&raw_key) else {
                tracing::warn!(key = %raw_key, "ignoring malformed issue key in store");
                continue;
            };
            issues.push(Issue {
                key,
                summary: row.get("summary"),
                initiative: row.get("initiative_name"),
                squad: row.get("squad_name"),
            });
        }
        Ok(issues)
    }

    async fn upsert_issue(&self, issue: &Issue) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO issues (issue_key, summary, initiative_name, squad_name, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(issue_key) DO UPDATE SET
                summary = excluded.summary,
                initiative_name = excluded.initiative_name,
                squad_name = excluded.squad_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(issue.key.as_str())
        .bind(&issue.summary)
        .bind(&issue.initiative)
        .bind(&issue.squad)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MappingStore for SqliteStore {
    async fn upsert_document(&self, snapshot: &DocumentSnapshot) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (page_id, database_id, page_url, page_title, page_type,
                                   content, properties_json, raw_json, last_synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(page_id) DO NOTHING
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.database_id)
        .bind(&snapshot.url)
        .bind(&snapshot.title)
        .bind(&snapshot.page_type)
        .bind(&snapshot.content)
        .bind(&snapshot.properties_json)
        .bind(&snapshot.raw_json)
        .bind(snapshot.last_synced_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(write_outcome(result.rows_affected()))
    }

    async fn lookup_issue_row_id(&self, key: &IssueKey) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM issues WHERE issue_key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn insert_mapping(&self, record: &MappingRecord) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO issue_document_mappings (id, issue_id, page_id, page_url,
                                                 mapping_type, sync_enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(issue_id, page_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(record.issue_id)
        .bind(&record.document_id)
        .bind(&record.document_url)
        .bind(record.origin.as_str())
        .bind(record.sync_enabled)
        .bind(record.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(write_outcome(result.rows_affected()))
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let issues: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
            .fetch_one(&self.pool)
            .await?;
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let mappings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issue_document_mappings")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreCounts {
            issues,
            documents,
            mappings,
        })
    }
}
