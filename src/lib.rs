//! # issue-linker
//!
//! Discovers which documents reference which tracked issues and keeps that
//! many-to-many mapping in SQLite.
//!
//! Pages are fetched from a document search API (Notion directly, or through
//! a proxy worker), scanned for issue keys such as `OBD-42`, and matched
//! against the issues already known to the store. Every page is kept as a
//! snapshot; every match becomes an `auto` mapping row. Writes are
//! insert-or-ignore, so a run can be repeated safely.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────────────────────┐   ┌──────────┐
//! │   Search   │──▶│ dedupe → extract → match    │──▶│  SQLite   │
//! │Notion/Proxy│   │          → persist          │   │ snapshots │
//! └────────────┘   └──────────────▲──────────────┘   │ mappings  │
//!                                 │                  └────┬─────┘
//!                          known issue keys ◀────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ilink init                        # create database
//! ilink issues import issues.json   # load the known issues
//! ilink sync                        # search Notion and map pages
//! ilink ingest results.json         # or map pre-fetched results
//! ilink coverage                    # mapped issues per squad
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`extract`] | Issue-key extraction from free text |
//! | [`matcher`] | Documents × known keys → mapping candidates |
//! | [`dedup`] | One document per resolved identifier |
//! | [`persist`] | Idempotent snapshot and mapping writes |
//! | [`sync`] | Pipeline orchestration and run summary |
//! | [`terms`] | Search terms from issue metadata |
//! | [`store`] | Storage traits and in-memory backend |
//! | [`sqlite_store`] | SQLite backend |
//! | [`traits`] | Document search trait |
//! | [`connector_notion`] | Notion search API client |
//! | [`connector_proxy`] | Proxy worker client |
//! | [`ingest`] | Reconcile results from a file |
//! | [`issues`] | Issue import |
//! | [`stats`] | Totals and squad coverage |
//! | [`progress`] | Sync progress on stderr |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Item and run error types |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod connector_notion;
pub mod connector_proxy;
pub mod db;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod issues;
pub mod matcher;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod sync;
pub mod terms;
pub mod traits;
