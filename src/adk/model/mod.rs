// SPDX-License-Identifier: MIT

//! Model module - defines the LLM call interface
//!
//! This module provides the core Model trait and the message types that
//! flow through it. The concrete client lives in [openai], which speaks
//! the OpenAI-compatible chat completions protocol.

pub mod openai;

use crate::adk::error::Result;
use crate::adk::tool::{Tool, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl GenerationConfig {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Parts of a message - text, images, function calls and their responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    /// Regular text
    Text(String),
    /// Image reference (http(s) URL or data URL) for vision models
    Image { url: String },
    /// Function/tool call requested by the model
    FunctionCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    /// Response from executing a function/tool
    FunctionResponse {
        id: String,
        name: String,
        response: serde_json::Value,
    },
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Text of every `Text` part, concatenated in order
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool calls requested in this message, in the order the model issued them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall { id, name, args } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: args.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Core trait for LLM model implementations
///
/// `history` starts with the system message. `tools` carries the tool
/// set bound for this one call; `None` or an empty slice disables tool
/// calling.
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_text_joins_text_parts() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![
                Part::Text("Answer: ".to_string()),
                Part::FunctionCall {
                    id: "c1".to_string(),
                    name: "vqa_tool".to_string(),
                    args: json!({}),
                },
                Part::Text("dog".to_string()),
            ],
        };
        assert_eq!(content.text(), "Answer: dog");
    }

    #[test]
    fn test_content_tool_calls_keep_order() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![
                Part::FunctionCall {
                    id: "a".to_string(),
                    name: "wikipedia".to_string(),
                    args: json!({"query": "dog"}),
                },
                Part::FunctionCall {
                    id: "b".to_string(),
                    name: "arxiv".to_string(),
                    args: json!({"query": "dog"}),
                },
            ],
        };
        let calls = content.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[1].name, "arxiv");
    }

    #[test]
    fn test_plain_message_has_no_tool_calls() {
        assert!(Content::user("question: what?").tool_calls().is_empty());
    }
}
