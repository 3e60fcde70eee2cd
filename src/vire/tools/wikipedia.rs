// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{normalize_snippet, squash, WIKIPEDIA_TOOL};
use crate::adk::error::{Result, VireError};
use crate::adk::tool::{Tool, ToolKind};

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
const NO_RESULT: &str = "No good Wikipedia Search Result was found";

static WIKIPEDIA_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query for Wikipedia"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Deserialize)]
struct WikipediaArgs {
    query: String,
}

/// Encyclopedic lookup via the MediaWiki search and extracts APIs
pub struct WikipediaTool {
    client: Client,
    endpoint: String,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaTool {
    pub fn new(top_k: usize, max_chars: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: WIKIPEDIA_API.to_string(),
            top_k: top_k.max(1),
            max_chars,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| VireError::config(format!("invalid Wikipedia endpoint: {}", e)))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().copied())
            .append_pair("format", "json");

        let resp = self
            .client
            .get(url)
            .header("User-Agent", concat!("vire-rs/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(VireError::api("Wikipedia", format!("{} - {}", status, text)));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        WIKIPEDIA_TOOL
    }

    fn description(&self) -> &str {
        "Looks up encyclopedic background knowledge on Wikipedia. Returns page titles with their intro summaries."
    }

    fn schema(&self) -> &Value {
        &WIKIPEDIA_SCHEMA
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Knowledge
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: WikipediaArgs = serde_json::from_value(input)?;
        let limit = self.top_k.to_string();

        let search = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", &args.query),
                ("srlimit", &limit),
            ])
            .await?;
        let titles = search_titles(&search);
        if titles.is_empty() {
            return Ok(Value::String(NO_RESULT.to_string()));
        }

        let joined = titles.join("|");
        let pages = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", &joined),
            ])
            .await?;

        let text = render_pages(&titles, &pages);
        if text.is_empty() {
            return Ok(Value::String(NO_RESULT.to_string()));
        }
        Ok(Value::String(normalize_snippet(
            WIKIPEDIA_TOOL,
            &text,
            self.max_chars,
        )))
    }
}

fn search_titles(body: &Value) -> Vec<String> {
    body.pointer("/query/search")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|h| h.get("title").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `Page:`/`Summary:` blocks in search-rank order
fn render_pages(titles: &[String], body: &Value) -> String {
    let Some(pages) = body.pointer("/query/pages").and_then(Value::as_object) else {
        return String::new();
    };

    let extract_for = |title: &str| {
        pages.values().find_map(|page| {
            let same = page.get("title").and_then(Value::as_str) == Some(title);
            let extract = page.get("extract").and_then(Value::as_str)?;
            (same && !extract.trim().is_empty()).then(|| squash(extract))
        })
    };

    titles
        .iter()
        .filter_map(|title| extract_for(title).map(|s| format!("Page: {}\nSummary: {}", title, s)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_titles_in_rank_order() {
        let body = json!({
            "query": {"search": [
                {"title": "Siberian Husky", "pageid": 1},
                {"title": "Alaskan Malamute", "pageid": 2}
            ]}
        });
        assert_eq!(search_titles(&body), vec!["Siberian Husky", "Alaskan Malamute"]);
        assert!(search_titles(&json!({"batchcomplete": ""})).is_empty());
    }

    #[test]
    fn test_render_pages_keeps_rank_and_skips_empty() {
        let titles = vec![
            "Siberian Husky".to_string(),
            "Stub".to_string(),
            "Alaskan Malamute".to_string(),
        ];
        let body = json!({
            "query": {"pages": {
                "2": {"title": "Alaskan Malamute", "extract": "A large   sled dog."},
                "1": {"title": "Siberian Husky", "extract": "A medium-sized\nworking dog."},
                "3": {"title": "Stub", "extract": ""}
            }}
        });

        assert_eq!(
            render_pages(&titles, &body),
            "Page: Siberian Husky\nSummary: A medium-sized working dog.\n\n\
             Page: Alaskan Malamute\nSummary: A large sled dog."
        );
    }

    #[test]
    fn test_tool_metadata() {
        let tool = WikipediaTool::new(0, 100);
        assert_eq!(tool.name(), "wikipedia");
        assert_eq!(tool.kind(), ToolKind::Knowledge);
        assert_eq!(tool.top_k, 1);
    }

    #[tokio::test]
    async fn test_bad_endpoint_is_config_error() {
        let tool = WikipediaTool::new(3, 100).with_endpoint("not a url");
        let err = tool.execute(json!({"query": "husky"})).await.unwrap_err();
        assert!(matches!(err, VireError::Config(_)));
    }
}
