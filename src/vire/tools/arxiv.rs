// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{normalize_snippet, squash, ARXIV_TOOL};
use crate::adk::error::{Result, VireError};
use crate::adk::tool::{Tool, ToolKind};

const ARXIV_API: &str = "http://export.arxiv.org/api/query";
const NO_RESULT: &str = "No good Arxiv Result was found";

static ARXIV_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query for arXiv papers"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Deserialize)]
struct ArxivArgs {
    query: String,
}

/// One `<entry>` of the arXiv Atom feed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArxivEntry {
    pub title: String,
    pub summary: String,
    pub published: String,
    pub authors: Vec<String>,
}

impl ArxivEntry {
    fn render(&self) -> String {
        let date = self.published.get(..10).unwrap_or(&self.published);
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            date,
            self.title,
            self.authors.join(", "),
            self.summary
        )
    }
}

/// Scientific background from the arXiv query API
pub struct ArxivTool {
    client: Client,
    endpoint: String,
    max_results: usize,
    max_chars: usize,
}

impl ArxivTool {
    pub fn new(max_results: usize, max_chars: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: ARXIV_API.to_string(),
            max_results: max_results.max(1),
            max_chars,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Tool for ArxivTool {
    fn name(&self) -> &str {
        ARXIV_TOOL
    }

    fn description(&self) -> &str {
        "Searches arXiv for scientific papers. Returns publication date, title, authors and abstract."
    }

    fn schema(&self) -> &Value {
        &ARXIV_SCHEMA
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Knowledge
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: ArxivArgs = serde_json::from_value(input)?;

        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| VireError::config(format!("invalid arXiv endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("search_query", &format!("all:{}", args.query))
            .append_pair("start", "0")
            .append_pair("max_results", &self.max_results.to_string());

        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(VireError::api("arXiv", format!("{} - {}", status, text)));
        }

        let feed = resp.text().await?;
        let entries = parse_feed(&feed)?;
        if entries.is_empty() {
            return Ok(Value::String(NO_RESULT.to_string()));
        }

        let text = entries
            .iter()
            .map(ArxivEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Value::String(normalize_snippet(
            ARXIV_TOOL,
            &text,
            self.max_chars,
        )))
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Summary,
    Published,
    AuthorName,
}

/// Parse the entries of an Atom feed; feed-level elements are ignored
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => current = Some(ArxivEntry::default()),
                b"author" if current.is_some() => in_author = true,
                name if current.is_some() => {
                    field = match name {
                        b"title" => Some(Field::Title),
                        b"summary" => Some(Field::Summary),
                        b"published" => Some(Field::Published),
                        b"name" if in_author => Some(Field::AuthorName),
                        _ => None,
                    };
                    buf.clear();
                }
                _ => {}
            },
            Event::Text(t) if field.is_some() => {
                let text = t.decode().map_err(|e| VireError::Xml(e.to_string()))?;
                buf.push_str(&text);
            }
            Event::CData(c) if field.is_some() => {
                let text = c.decode().map_err(|e| VireError::Xml(e.to_string()))?;
                buf.push_str(&text);
            }
            Event::GeneralRef(r) if field.is_some() => {
                let name = r.decode().map_err(|e| VireError::Xml(e.to_string()))?;
                match resolve_entity(&name) {
                    Some(c) => buf.push(c),
                    None => {
                        buf.push('&');
                        buf.push_str(&name);
                        buf.push(';');
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = None;
                }
                b"author" => in_author = false,
                _ => {
                    if let (Some(f), Some(entry)) = (field.take(), current.as_mut()) {
                        let value = squash(&buf);
                        match f {
                            Field::Title => entry.title = value,
                            Field::Summary => entry.summary = value,
                            Field::Published => entry.published = value,
                            Field::AuthorName => entry.authors.push(value),
                        }
                    }
                    buf.clear();
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
