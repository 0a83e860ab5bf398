//! Notion search API connector.
//!
//! Queries `POST /v1/search` for pages matching a term and adapts each page
//! object into a typed [`Document`].
//!
//! # Configuration
//!
//! ```toml
//! [search]
//! provider = "notion"
//! api_base = "https://api.notion.com"
//! notion_version = "2022-06-28"
//! page_size = 10
//! token_env = "NOTION_API_KEY"
//! ```
//!
//! The integration token is read from the environment variable named by
//! `token_env`. Pages must be shared with the integration to show up.
//!
//! # Page adaptation
//!
//! | Document field | Source |
//! |----------------|--------|
//! | `id` | `page.id` |
//! | `url` | `page.url`, else `https://notion.so/<id without hyphens>` |
//! | `title` | first `title` property, `plain_text` fragments joined |
//! | `body` | every `rich_text` property, joined with spaces |
//! | `database_id` | `page.parent.database_id` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::models::{Document, UNTITLED};
use crate::traits::DocumentSearch;

/// Client for the Notion search endpoint.
pub struct NotionSearch {
    client: reqwest::Client,
    api_base: String,
    notion_version: String,
    page_size: u32,
    token: String,
}

impl NotionSearch {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token environment variable is not set or the
    /// HTTP client cannot be built.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.token_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            notion_version: config.notion_version.clone(),
            page_size: config.page_size,
            token,
        })
    }
}

#[async_trait]
impl DocumentSearch for NotionSearch {
    fn name(&self) -> &str {
        "notion"
    }

    async fn search(&self, term: &str) -> Result<Vec<Document>> {
        let body = serde_json::json!({
            "query": term,
            "filter": { "property": "object", "value": "page" },
            "page_size": self.page_size,
        });

        let response = self
            .client
            .post(format!("{}/v1/search", self.api_base))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", self.notion_version.as_str())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Notion search request for {:?}", term))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Notion API error {}: {}", status, truncate(&text, 100));
        }

        let json: Value = response.json().await?;
        Ok(parse_search_response(&json))
    }
}

/// Adapt a search response body into documents. A body without a
/// `results` array yields nothing.
pub fn parse_search_response(json: &Value) -> Vec<Document> {
    results(json).iter().map(page_to_document).collect()
}

pub(crate) fn results(json: &Value) -> &[Value] {
    json.get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Adapt one Notion page object.
pub fn page_to_document(page: &Value) -> Document {
    let id = non_empty_str(page.get("id"));
    let properties = page
        .get("properties")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    Document {
        url: non_empty_str(page.get("url")).or_else(|| id.as_deref().map(fallback_page_url)),
        id,
        title: Some(title_property(&properties).unwrap_or_else(|| UNTITLED.to_string())),
        body: rich_text_properties(&properties),
        excerpt: None,
        database_id: page
            .get("parent")
            .and_then(|p| non_empty_str(p.get("database_id"))),
        page_type: non_empty_str(page.get("object")).unwrap_or_else(|| "page".to_string()),
        properties,
        raw: page.clone(),
    }
}

/// `https://notion.so/<id without hyphens>`.
pub(crate) fn fallback_page_url(id: &str) -> String {
    format!("https://notion.so/{}", id.replace('-', ""))
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Concatenate the `plain_text` of a rich-text array.
pub(crate) fn plain_text(fragments: &Value, separator: &str) -> String {
    fragments
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(separator)
        })
        .unwrap_or_default()
}

fn title_property(properties: &Value) -> Option<String> {
    let props = properties.as_object()?;
    props.values().find_map(|prop| {
        if prop.get("type").and_then(Value::as_str) != Some("title") {
            return None;
        }
        let title = prop.get("title")?;
        if title.as_array().map_or(true, Vec::is_empty) {
            return None;
        }
        Some(plain_text(title, ""))
    })
}

fn rich_text_properties(properties: &Value) -> String {
    let Some(props) = properties.as_object() else {
        return String::new();
    };
    props
        .values()
        .filter(|prop| prop.get("type").and_then(Value::as_str) == Some("rich_text"))
        .filter_map(|prop| prop.get("rich_text"))
        .filter(|rt| rt.as_array().is_some_and(|a| !a.is_empty()))
        .map(|rt| plain_text(rt, " "))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Value {
        json!({
            "object": "page",
            "id": "01234567-89ab-cdef-0123-456789abcdef",
            "url": "https://www.notion.so/Checkout-0123456789abcdef0123456789abcdef",
            "parent": { "type": "database_id", "database_id": "db-1" },
            "properties": {
                "Name": {
                    "type": "title",
                    "title": [{ "plain_text": "Checkout " }, { "plain_text": "OBD-12" }]
                },
                "Notes": {
                    "type": "rich_text",
                    "rich_text": [{ "plain_text": "blocked by" }, { "plain_text": "APM-4" }]
                },
                "Empty": { "type": "rich_text", "rich_text": [] },
                "Status": { "type": "select", "select": { "name": "Done" } }
            }
        })
    }

    #[test]
    fn test_page_to_document() {
        let doc = page_to_document(&page());
        assert_eq!(doc.id.as_deref(), Some("01234567-89ab-cdef-0123-456789abcdef"));
        assert_eq!(doc.title.as_deref(), Some("Checkout OBD-12"));
        assert_eq!(doc.body, "blocked by APM-4");
        assert_eq!(doc.database_id.as_deref(), Some("db-1"));
        assert_eq!(doc.page_type, "page");
        assert!(doc.properties.get("Status").is_some());
    }

    #[test]
    fn test_missing_title_and_url_fall_back() {
        let doc = page_to_document(&json!({ "id": "ab-cd", "properties": {} }));
        assert_eq!(doc.title.as_deref(), Some(UNTITLED));
        assert_eq!(doc.url.as_deref(), Some("https://notion.so/abcd"));
        assert_eq!(doc.body, "");
    }

    #[test]
    fn test_page_without_id_has_no_identifier() {
        let doc = page_to_document(&json!({ "properties": {} }));
        assert_eq!(doc.id, None);
        assert_eq!(doc.url, None);
        assert_eq!(doc.resolved_id(), None);
    }

    #[test]
    fn test_parse_search_response() {
        let body = json!({ "object": "list", "results": [page(), { "id": "x" }] });
        assert_eq!(parse_search_response(&body).len(), 2);
        assert!(parse_search_response(&json!({ "message": "nope" })).is_empty());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("ñandú", 3), "ñan");
        assert_eq!(truncate("ok", 100), "ok");
    }
}
