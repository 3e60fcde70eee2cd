// SPDX-License-Identifier: MIT

//! Tool invocation against the shared registry
//!
//! The invoker never fails: a missing tool, a tool outside the analyst's
//! capability set, a tool error or a timeout all come back as a
//! [`ToolResult`] carrying a [`ToolFailure`]. No retries happen here.

use std::time::Duration;

use crate::adk::error::{ToolFailure, ToolFailureKind};
use crate::adk::tool::{ToolCall, ToolResult};
use crate::vire::analyst::AnalystSpec;
use crate::vire::workflow::registry::ToolRegistry;

/// Executes single tool calls on behalf of an analyst
#[derive(Clone)]
pub struct ToolInvoker {
    registry: ToolRegistry,
    timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound every tool call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run `call` if `analyst` may use the tool
    pub async fn invoke(&self, call: &ToolCall, analyst: &AnalystSpec) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name).await else {
            log::error!("Tool {} not found", call.name);
            return ToolResult::failure(
                call,
                None,
                ToolFailure::new(
                    ToolFailureKind::NotFound,
                    format!("Tool '{}' not found", call.name),
                ),
            );
        };

        if !analyst.can_use(&call.name) {
            log::error!(
                "Analyst {} requested tool {} outside its capability set",
                analyst.name,
                call.name
            );
            return ToolResult::failure(
                call,
                Some(tool.kind()),
                ToolFailure::new(
                    ToolFailureKind::NotPermitted,
                    format!("Analyst '{}' may not call '{}'", analyst.name, call.name),
                ),
            );
        }

        log::info!("Tool call: {} {}", call.name, call.arguments);

        let execution = tool.execute(call.arguments.clone());
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(res) => {
                    res.map_err(|e| ToolFailure::new(ToolFailureKind::Raised, e.to_string()))
                }
                Err(_) => Err(ToolFailure::new(
                    ToolFailureKind::TimedOut,
                    format!("no response within {:?}", limit),
                )),
            },
            None => execution
                .await
                .map_err(|e| ToolFailure::new(ToolFailureKind::Raised, e.to_string())),
        };

        match outcome {
            Ok(payload) => {
                log::debug!("Tool {} response: {}", call.name, payload);
                ToolResult::success(call, tool.kind(), payload)
            }
            Err(failure) => {
                log::error!("Tool {} failed: {}", call.name, failure);
                ToolResult::failure(call, Some(tool.kind()), failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{Result, VireError};
    use crate::adk::tool::{Tool, ToolKind};
    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use serde_json::{json, Value};
    use std::sync::Arc;

    static SCHEMA: Lazy<Value> = Lazy::new(|| json!({"type": "object"}));

    enum Behavior {
        Echo,
        Fail,
        Hang,
    }

    struct ScriptedTool {
        name: String,
        kind: ToolKind,
        behavior: Behavior,
    }

    #[async_trait]
    impl Tool for ScriptedTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "scripted"
        }
        fn schema(&self) -> &Value {
            &SCHEMA
        }
        fn kind(&self) -> ToolKind {
            self.kind
        }
        async fn execute(&self, input: Value) -> Result<Value> {
            match self.behavior {
                Behavior::Echo => Ok(json!({ "echo": input })),
                Behavior::Fail => Err(VireError::api("wiki", "503 Service Unavailable")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Value::Null)
                }
            }
        }
    }

    async fn invoker_with(name: &str, kind: ToolKind, behavior: Behavior) -> ToolInvoker {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(ScriptedTool {
                name: name.to_string(),
                kind,
                behavior,
            }))
            .await;
        ToolInvoker::new(registry)
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_0".to_string(),
            name: name.to_string(),
            arguments: json!({"query": "husky"}),
        }
    }

    #[tokio::test]
    async fn test_successful_call_carries_kind_and_payload() {
        let invoker = invoker_with("wikipedia", ToolKind::Knowledge, Behavior::Echo).await;
        let result = invoker.invoke(&call("wikipedia"), &AnalystSpec::senior()).await;

        assert!(result.succeeded());
        assert_eq!(result.kind, Some(ToolKind::Knowledge));
        assert_eq!(result.payload.unwrap()["echo"]["query"], "husky");
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_found() {
        let invoker = ToolInvoker::new(ToolRegistry::new());
        let result = invoker.invoke(&call("wikipedia"), &AnalystSpec::senior()).await;

        assert_eq!(result.error.unwrap().kind, ToolFailureKind::NotFound);
        assert!(result.kind.is_none());
    }

    #[tokio::test]
    async fn test_tool_outside_capability_set_is_not_permitted() {
        let invoker = invoker_with("wikipedia", ToolKind::Knowledge, Behavior::Echo).await;
        let result = invoker.invoke(&call("wikipedia"), &AnalystSpec::junior()).await;

        assert_eq!(result.error.unwrap().kind, ToolFailureKind::NotPermitted);
    }

    #[tokio::test]
    async fn test_raised_error_becomes_failure() {
        let invoker = invoker_with("arxiv", ToolKind::Knowledge, Behavior::Fail).await;
        let result = invoker.invoke(&call("arxiv"), &AnalystSpec::manager()).await;

        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ToolFailureKind::Raised);
        assert!(failure.detail.contains("503"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure() {
        let invoker = invoker_with("vqa_tool", ToolKind::VisualQa, Behavior::Hang)
            .await
            .with_timeout(Duration::from_millis(20));
        let result = invoker.invoke(&call("vqa_tool"), &AnalystSpec::junior()).await;

        assert_eq!(result.error.unwrap().kind, ToolFailureKind::TimedOut);
        assert_eq!(result.kind, Some(ToolKind::VisualQa));
    }
}
