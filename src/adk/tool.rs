// SPDX-License-Identifier: MIT

use crate::adk::error::{Result, ToolFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing category of a tool's result inside an analyst branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Visual question answering; result replaces the branch's answer candidate
    VisualQa,
    /// Knowledge-base lookup; result is appended to accumulated knowledge
    Knowledge,
    /// Model-generated background; result replaces the auxiliary knowledge
    Insight,
}

/// Trait for tools that can be called by analysts.
///
/// `name()`, `description()` and `schema()` return borrowed data; implementations
/// keep these in struct fields or statics.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Where the branch routes this tool's results
    fn kind(&self) -> ToolKind;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Outcome of one tool call. Exactly one of `payload` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    /// Category of the tool that ran; `None` when no tool was resolved
    pub kind: Option<ToolKind>,
    pub payload: Option<Value>,
    pub error: Option<ToolFailure>,
}

impl ToolResult {
    pub fn success(call: &ToolCall, kind: ToolKind, payload: Value) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            kind: Some(kind),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(call: &ToolCall, kind: Option<ToolKind>, error: ToolFailure) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            kind,
            payload: None,
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Body of the observation message fed back to the model
    pub fn observation(&self) -> Value {
        match (&self.payload, &self.error) {
            (Some(payload), _) => payload.clone(),
            (None, Some(err)) => serde_json::json!({ "error": err.to_string() }),
            (None, None) => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ToolFailureKind;
    use serde_json::json;

    fn call() -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "wikipedia".to_string(),
            arguments: json!({"query": "husky"}),
        }
    }

    #[test]
    fn test_success_observation_is_payload() {
        let result = ToolResult::success(&call(), ToolKind::Knowledge, json!("snippet"));
        assert!(result.succeeded());
        assert_eq!(result.observation(), json!("snippet"));
        assert_eq!(result.call_id, "call_1");
    }

    #[test]
    fn test_failure_observation_is_error_note() {
        let result = ToolResult::failure(
            &call(),
            None,
            ToolFailure::new(ToolFailureKind::NotFound, "no tool named wikipedia"),
        );
        assert!(!result.succeeded());
        let note = result.observation();
        assert!(note["error"].as_str().unwrap().contains("NotFound"));
    }
}
