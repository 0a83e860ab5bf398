//! Database schema migrations (idempotent).
//!
//! | Table | Holds |
//! |-------|-------|
//! | `issues` | tracked issues, the known-key universe |
//! | `documents` | page snapshots, one row per page id |
//! | `issue_document_mappings` | issue↔page associations, unique per pair |

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_key TEXT NOT NULL UNIQUE,
            summary TEXT,
            initiative_name TEXT,
            squad_name TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            page_id TEXT PRIMARY KEY,
            database_id TEXT,
            page_url TEXT,
            page_title TEXT NOT NULL,
            page_type TEXT NOT NULL DEFAULT 'page',
            content TEXT NOT NULL DEFAULT '',
            properties_json TEXT NOT NULL DEFAULT '{}',
            raw_json TEXT NOT NULL DEFAULT '{}',
            last_synced_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Pages may be mapped before (or without) a snapshot landing, so
    // page_id carries no foreign key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_document_mappings (
            id TEXT PRIMARY KEY,
            issue_id INTEGER NOT NULL,
            page_id TEXT NOT NULL,
            page_url TEXT,
            mapping_type TEXT NOT NULL DEFAULT 'auto',
            sync_enabled INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            UNIQUE(issue_id, page_id),
            FOREIGN KEY (issue_id) REFERENCES issues(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_mappings_page_id ON issue_document_mappings(page_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_squad ON issues(squad_name)")
        .execute(pool)
        .await?;

    Ok(())
}
