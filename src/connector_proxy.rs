//! Notion search through a proxy worker.
//!
//! Some deployments keep the Notion token inside an edge worker and expose a
//! narrow `GET` endpoint instead:
//!
//! ```text
//! GET {proxy_url}?action=searchPages&initiativeName=<term>
//! ```
//!
//! The worker answers with the same `{ "results": [...] }` envelope as the
//! Notion API. Pages from the initiatives database carry their title in an
//! `Initiative` property; others use `Name`. The body is the serialized
//! property bag, so keys mentioned in any property are found by the matcher.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::connector_notion::{fallback_page_url, non_empty_str, results, truncate};
use crate::models::{Document, UNTITLED};
use crate::traits::DocumentSearch;

/// Client for the search proxy.
pub struct ProxySearch {
    client: reqwest::Client,
    proxy_url: String,
}

impl ProxySearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let proxy_url = config
            .proxy_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("search.proxy_url required for proxy provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, proxy_url })
    }
}

#[async_trait]
impl DocumentSearch for ProxySearch {
    fn name(&self) -> &str {
        "proxy"
    }

    async fn search(&self, term: &str) -> Result<Vec<Document>> {
        let response = self
            .client
            .get(&self.proxy_url)
            .query(&[("action", "searchPages"), ("initiativeName", term)])
            .send()
            .await
            .with_context(|| format!("proxy search request for {:?}", term))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("proxy error {}: {}", status, truncate(&text, 100));
        }

        let json: Value = response.json().await?;
        Ok(results(&json).iter().map(proxy_page_to_document).collect())
    }
}

/// Adapt one page returned by the proxy.
pub fn proxy_page_to_document(page: &Value) -> Document {
    let id = non_empty_str(page.get("id"));
    let properties = page
        .get("properties")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    let title = ["Initiative", "Name"]
        .iter()
        .find_map(|name| first_title_fragment(&properties, name))
        .unwrap_or_else(|| UNTITLED.to_string());

    Document {
        url: non_empty_str(page.get("url")).or_else(|| id.as_deref().map(fallback_page_url)),
        id,
        title: Some(title),
        body: properties.to_string(),
        excerpt: None,
        database_id: page
            .get("parent")
            .and_then(|p| non_empty_str(p.get("database_id"))),
        page_type: "page".to_string(),
        properties,
        raw: page.clone(),
    }
}

fn first_title_fragment(properties: &Value, name: &str) -> Option<String> {
    properties
        .get(name)?
        .get("title")?
        .get(0)?
        .get("plain_text")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
