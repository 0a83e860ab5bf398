//! The document-search seam.
//!
//! The sync orchestrator only knows [`DocumentSearch`]: one query term in,
//! typed [`Document`]s out. Built-in implementations talk to the Notion search
//! API directly ([`NotionSearch`](crate::connector_notion::NotionSearch)) or
//! through a proxy worker ([`ProxySearch`](crate::connector_proxy::ProxySearch)).
//! Tests and embedders can supply their own.
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use issue_linker::models::Document;
//! use issue_linker::traits::DocumentSearch;
//!
//! struct Fixed(Vec<Document>);
//!
//! #[async_trait]
//! impl DocumentSearch for Fixed {
//!     fn name(&self) -> &str { "fixed" }
//!
//!     async fn search(&self, _term: &str) -> Result<Vec<Document>> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::connector_notion::NotionSearch;
use crate::connector_proxy::ProxySearch;
use crate::models::Document;

/// A document store that can be queried by free-text term.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Short label used in progress output and summaries.
    fn name(&self) -> &str;

    /// Run one query. An empty result is not an error.
    ///
    /// Errors are reported per term by the caller and never abort a run.
    async fn search(&self, term: &str) -> Result<Vec<Document>>;
}

/// Create the search client selected by `provider`.
///
/// # Supported Providers
///
/// | Value | Client |
/// |-------|--------|
/// | `"notion"` | [`NotionSearch`] |
/// | `"proxy"` | [`ProxySearch`] |
pub fn create_search(config: &SearchConfig, provider: &str) -> Result<Box<dyn DocumentSearch>> {
    match provider {
        "notion" => Ok(Box::new(NotionSearch::new(config)?)),
        "proxy" => Ok(Box::new(ProxySearch::new(config)?)),
        other => bail!("Unknown search provider: {}", other),
    }
}
