// SPDX-License-Identifier: MIT

//! Concrete collaborators behind the `Tool` and `Captioner` seams

pub mod arxiv;
pub mod caption;
pub mod insight;
pub mod vqa;
pub mod wikipedia;

use std::sync::Arc;

use crate::adk::model::Model;
use crate::vire::workflow::config::ToolSettings;
use crate::vire::workflow::registry::ToolRegistry;

pub const VQA_TOOL: &str = "vqa_tool";
pub const WIKIPEDIA_TOOL: &str = "wikipedia";
pub const ARXIV_TOOL: &str = "arxiv";
pub const LLM_INSIGHT_TOOL: &str = "llm_insight";

/// Registry holding the four standard tools, all backed by `model` where
/// they need one
pub async fn default_registry(model: Arc<dyn Model>, settings: &ToolSettings) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry
        .register(Arc::new(vqa::VisualQaTool::new(model.clone())))
        .await;
    registry
        .register(Arc::new(wikipedia::WikipediaTool::new(
            settings.wikipedia_top_k,
            settings.max_snippet_chars,
        )))
        .await;
    registry
        .register(Arc::new(arxiv::ArxivTool::new(
            settings.arxiv_max_results,
            settings.max_snippet_chars,
        )))
        .await;
    registry
        .register(Arc::new(insight::LlmInsightTool::new(model)))
        .await;
    registry
}

/// Collapse whitespace, tag with `source` and cut to `max_chars` characters
pub fn normalize_snippet(source: &str, text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let body = match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &collapsed[..idx]),
        None => collapsed,
    };
    format!("[{}] {}", source, body)
}

/// Collapse runs of whitespace inside one field
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
