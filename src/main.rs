//! # issue-linker CLI (`ilink`)
//!
//! ## Usage
//!
//! ```bash
//! ilink --config ./config/ilink.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ilink init` | Create the SQLite database and schema |
//! | `ilink issues import <file>` | Load issues from a JSON export |
//! | `ilink sync` | Search the document store and map pages to issues |
//! | `ilink ingest <file>` | Map pages from a saved search-results file |
//! | `ilink stats` | Row totals |
//! | `ilink coverage` | Mapped issues per squad |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use issue_linker::config;
use issue_linker::db;
use issue_linker::ingest;
use issue_linker::issues;
use issue_linker::migrate;
use issue_linker::progress::ProgressMode;
use issue_linker::sqlite_store::SqliteStore;
use issue_linker::stats;
use issue_linker::sync::{run_sync, SyncOptions};
use issue_linker::traits::create_search;

/// issue-linker: map tracker issues to the documents that mention them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ilink.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ilink",
    about = "Map tracker issues to the documents that mention them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ilink.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Manage the known issues.
    Issues {
        #[command(subcommand)]
        action: IssuesAction,
    },

    /// Search the document store and map pages to known issues.
    ///
    /// Search terms come from squad names, initiative names, and issue keys.
    /// Pages are stored as snapshots whether or not they match.
    Sync {
        /// Search provider, overriding `search.provider`.
        #[arg(long, value_parser = ["notion", "proxy"])]
        provider: Option<String>,

        /// Maximum number of search queries for this run.
        #[arg(long)]
        max_terms: Option<usize>,

        /// Fetch and match without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Map pages from a saved search-results file (JSON array of hits).
    Ingest {
        path: PathBuf,
    },

    /// Show row totals.
    Stats,

    /// Show mapped issues per squad.
    Coverage,
}

#[derive(Subcommand)]
enum IssuesAction {
    /// Import issues from a JSON array of `{issue_key, summary, initiative, squad}`.
    Import { path: PathBuf },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Issues {
            action: IssuesAction::Import { path },
        } => {
            issues::run_import(&cfg, &path).await?;
        }
        Commands::Sync {
            provider,
            max_terms,
            dry_run,
            progress,
        } => {
            if max_terms == Some(0) {
                anyhow::bail!("--max-terms must be >= 1");
            }
            let provider = provider.unwrap_or_else(|| cfg.search.provider.clone());
            let search = create_search(&cfg.search, &provider)?;
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();

            let pool = db::connect(&cfg).await?;
            let store = SqliteStore::new(pool);
            let options = SyncOptions { dry_run, max_terms };
            let summary = run_sync(&cfg, &store, search.as_ref(), reporter.as_ref(), &options).await;
            store.close().await;
            summary?.print();
        }
        Commands::Ingest { path } => {
            ingest::run_ingest(&cfg, &path).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Coverage => {
            stats::run_coverage(&cfg).await?;
        }
    }

    Ok(())
}
