// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::LLM_INSIGHT_TOOL;
use crate::adk::error::{Result, VireError};
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::adk::tool::{Tool, ToolKind};

static INSIGHT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Topic or question to generate background knowledge about"
            }
        },
        "required": ["query"]
    })
});

const INSIGHT_PROMPT: &str = "You are a knowledgeable assistant. Give short, factual background \
knowledge (at most three sentences) that helps answer the user's question about an image. \
Do not answer the question itself.";

#[derive(Debug, Deserialize)]
struct InsightArgs {
    query: String,
}

/// Background knowledge generated by the language model itself
pub struct LlmInsightTool {
    model: Arc<dyn Model>,
}

impl LlmInsightTool {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Tool for LlmInsightTool {
    fn name(&self) -> &str {
        LLM_INSIGHT_TOOL
    }

    fn description(&self) -> &str {
        "Generates contextual background knowledge with a language model."
    }

    fn schema(&self) -> &Value {
        &INSIGHT_SCHEMA
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Insight
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: InsightArgs = serde_json::from_value(input)?;
        let request = [Content::system(INSIGHT_PROMPT), Content::user(args.query)];

        let response = self
            .model
            .generate_content(&request, Some(&GenerationConfig::with_temperature(0.3)), None)
            .await?;

        let insight = response.text().trim().to_string();
        if insight.is_empty() {
            return Err(VireError::other("model produced no insight"));
        }
        Ok(Value::String(insight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::Part;

    struct Oracle;

    #[async_trait]
    impl Model for Oracle {
        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
            tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content> {
            assert!(tools.is_none());
            Ok(Content {
                role: "model".to_string(),
                parts: vec![Part::Text(format!(" About {} ", history[1].text()))],
            })
        }
    }

    #[tokio::test]
    async fn test_insight_is_trimmed_text() {
        let tool = LlmInsightTool::new(Arc::new(Oracle));
        let out = tool.execute(json!({"query": "elephants"})).await.unwrap();
        assert_eq!(out, json!("About elephants"));
        assert_eq!(tool.kind(), ToolKind::Insight);
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let tool = LlmInsightTool::new(Arc::new(Oracle));
        assert!(tool.execute(json!({})).await.is_err());
    }
}
