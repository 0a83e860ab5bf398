//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/ilink.sqlite"
//!
//! [search]
//! provider = "notion"          # notion | proxy
//! page_size = 10
//!
//! [sync]
//! max_terms = 50
//! pacing_ms = 400
//! ```
//!
//! Only `[db]` is required; every other section has defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_base: default_api_base(),
            notion_version: default_notion_version(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            proxy_url: None,
            token_env: default_token_env(),
        }
    }
}

fn default_provider() -> String {
    "notion".to_string()
}
fn default_api_base() -> String {
    "https://api.notion.com".to_string()
}
fn default_notion_version() -> String {
    "2022-06-28".to_string()
}
fn default_page_size() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_token_env() -> String {
    "NOTION_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Maximum issues read from the issue store per run.
    #[serde(default = "default_issue_limit")]
    pub issue_limit: usize,
    /// Hard cap on search queries per run.
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
    /// Delay between consecutive search queries.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_squad_terms")]
    pub squad_terms: usize,
    #[serde(default = "default_initiative_terms")]
    pub initiative_terms: usize,
    #[serde(default = "default_issue_key_terms")]
    pub issue_key_terms: usize,
    /// Fixed terms queried before the derived ones (project prefixes, team names).
    #[serde(default)]
    pub extra_terms: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            issue_limit: default_issue_limit(),
            max_terms: default_max_terms(),
            pacing_ms: default_pacing_ms(),
            squad_terms: default_squad_terms(),
            initiative_terms: default_initiative_terms(),
            issue_key_terms: default_issue_key_terms(),
            extra_terms: Vec::new(),
        }
    }
}

fn default_issue_limit() -> usize {
    1000
}
fn default_max_terms() -> usize {
    50
}
fn default_pacing_ms() -> u64 {
    400
}
fn default_squad_terms() -> usize {
    5
}
fn default_initiative_terms() -> usize {
    10
}
fn default_issue_key_terms() -> usize {
    30
}

impl SyncConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Config {
    /// A config with defaults everywhere and the database at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            search: SearchConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sync.max_terms == 0 {
        anyhow::bail!("sync.max_terms must be >= 1");
    }
    if config.sync.issue_limit == 0 {
        anyhow::bail!("sync.issue_limit must be >= 1");
    }
    if !(1..=100).contains(&config.search.page_size) {
        anyhow::bail!("search.page_size must be in [1, 100]");
    }

    match config.search.provider.as_str() {
        "notion" => {}
        "proxy" => {
            if config.search.proxy_url.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("search.proxy_url must be set when provider is 'proxy'");
            }
        }
        other => anyhow::bail!(
            "Unknown search provider: '{}'. Must be notion or proxy.",
            other
        ),
    }

    Ok(())
}
