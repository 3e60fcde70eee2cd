// SPDX-License-Identifier: MIT

//! Analyst loop - one branch's think/act/observe cycle
//!
//! ```text
//! AwaitingModel -> CheckingToolCalls -> InvokingTools -> AwaitingModel ...
//!                        |                    |
//!                        | no tool calls      | cycle bound reached
//!                        v                    v
//!                  FinalReasoning  <----------+
//!                        |
//!                        v
//!                       Done
//! ```
//!
//! All mutation is confined to the branch's own [`BranchState`], which is
//! dropped when [`AnalystLoop::run`] returns.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::adk::error::{Result, ToolFailure};
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::{Tool, ToolCall, ToolKind, ToolResult};
use crate::vire::analyst::AnalystSpec;
use crate::vire::prompt::{self, PromptValues, TemplateKind};
use crate::vire::workflow::invoker::ToolInvoker;

/// Default bound on model/tool cycles per branch
pub const DEFAULT_MAX_TOOL_CYCLES: u32 = 5;

const FINAL_REASONING_TEMPERATURE: f32 = 0.1;
const FINAL_USER_TURN: &str = "Please provide your final analysis and answer.";

/// Read-only input shared by every branch of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInput {
    pub question: String,
    pub image_ref: String,
    pub caption: String,
}

/// States of the analyst loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingModel,
    CheckingToolCalls,
    InvokingTools,
    FinalReasoning,
    Done,
}

/// Transition out of `CheckingToolCalls` given the latest model response
pub fn should_continue(response: &Content) -> LoopState {
    if response.tool_calls().is_empty() {
        LoopState::FinalReasoning
    } else {
        LoopState::InvokingTools
    }
}

/// Private, per-branch working state
#[derive(Debug, Default)]
struct BranchState {
    messages: Vec<Content>,
    /// Knowledge-base snippets, append-only
    knowledge: Vec<String>,
    /// Latest visual-QA candidates, overwritten per result
    answer_candidate: String,
    /// Latest model-generated insight, overwritten per result
    llm_knowledge: String,
    step_count: u32,
}

impl BranchState {
    fn seeded(system_prompt: String, question: &str) -> Self {
        Self {
            messages: vec![
                Content::system(system_prompt),
                Content::user(format!("question: {}", question)),
            ],
            ..Default::default()
        }
    }

    fn latest(&self) -> Option<&Content> {
        self.messages.last()
    }

    /// Fold one tool result into the branch and record it as an observation
    fn observe(&mut self, result: &ToolResult) {
        if let Some(payload) = &result.payload {
            match result.kind {
                Some(ToolKind::VisualQa) => self.answer_candidate = candidates_text(payload),
                Some(ToolKind::Knowledge) => self.knowledge.push(value_text(payload)),
                Some(ToolKind::Insight) => self.llm_knowledge = value_text(payload),
                None => {}
            }
        }

        self.messages.push(Content {
            role: "tool".to_string(),
            parts: vec![Part::FunctionResponse {
                id: result.call_id.clone(),
                name: result.tool_name.clone(),
                response: result.observation(),
            }],
        });
    }
}

/// What a finished branch reports back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutcome {
    pub analyst: String,
    pub answer: String,
    pub step_count: u32,
    pub tool_cycles: u32,
    /// The cycle bound forced final reasoning
    pub bound_reached: bool,
    pub transitions: Vec<LoopState>,
    pub tool_failures: Vec<ToolFailure>,
}

/// Drives one analyst through the loop
pub struct AnalystLoop {
    spec: Arc<AnalystSpec>,
    model: Arc<dyn Model>,
    invoker: ToolInvoker,
    max_tool_cycles: u32,
}

impl AnalystLoop {
    pub fn new(spec: Arc<AnalystSpec>, model: Arc<dyn Model>, invoker: ToolInvoker) -> Self {
        Self {
            spec,
            model,
            invoker,
            max_tool_cycles: DEFAULT_MAX_TOOL_CYCLES,
        }
    }

    /// Values below 1 are raised to 1
    pub fn with_max_tool_cycles(mut self, max_tool_cycles: u32) -> Self {
        self.max_tool_cycles = max_tool_cycles.max(1);
        self
    }

    pub fn spec(&self) -> &AnalystSpec {
        &self.spec
    }

    /// Run the loop to completion and return the branch's final answer
    ///
    /// Tool failures are folded into the history; only a model error ends
    /// the branch with `Err`.
    pub async fn run(&self, input: &BranchInput) -> Result<BranchOutcome> {
        log::debug!("{}", self.spec.persona());
        let tools = self.invoker.registry().subset(&self.spec.tools).await;

        let planning = prompt::render(
            &self.spec.prompt_template,
            TemplateKind::Planning,
            &PromptValues {
                question: &input.question,
                context: &input.caption,
                ..Default::default()
            },
        );
        if !planning.unfilled.is_empty() {
            log::debug!(
                "Analyst {} prompt left placeholders unfilled: {:?}",
                self.spec.name,
                planning.unfilled
            );
        }

        let mut branch = BranchState::seeded(planning.text, &input.question);
        let mut state = LoopState::AwaitingModel;
        let mut transitions = vec![state];
        let mut tool_cycles = 0;
        let mut bound_reached = false;
        let mut tool_failures = Vec::new();
        let mut answer = String::new();

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    log::info!(
                        "Analyst {} turn {}/{}",
                        self.spec.name,
                        tool_cycles + 1,
                        self.max_tool_cycles
                    );
                    let response = self
                        .model
                        .generate_content(&branch.messages, None, Some(&tools))
                        .await?;
                    branch.messages.push(response);
                    LoopState::CheckingToolCalls
                }
                LoopState::CheckingToolCalls => match branch.latest() {
                    Some(response) => should_continue(response),
                    None => LoopState::FinalReasoning,
                },
                LoopState::InvokingTools => {
                    let calls = branch
                        .latest()
                        .map(|c| c.tool_calls())
                        .unwrap_or_default();
                    let results = self.invoke_all(&calls, &tools, input).await;
                    for result in &results {
                        if let Some(failure) = &result.error {
                            log::warn!(
                                "Analyst {} tool {} degraded: {}",
                                self.spec.name,
                                result.tool_name,
                                failure
                            );
                            tool_failures.push(failure.clone());
                        }
                        branch.observe(result);
                    }

                    tool_cycles += 1;
                    branch.step_count += 1;
                    if tool_cycles >= self.max_tool_cycles {
                        log::warn!(
                            "Analyst {} reached the step bound ({}), forcing final reasoning",
                            self.spec.name,
                            self.max_tool_cycles
                        );
                        bound_reached = true;
                        LoopState::FinalReasoning
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::FinalReasoning => {
                    answer = self.final_reasoning(&mut branch, input).await?;
                    branch.step_count += 1;
                    LoopState::Done
                }
                LoopState::Done => break,
            };
            transitions.push(state);
        }

        log::info!(
            "Analyst {} finished after {} steps: '{}'",
            self.spec.name,
            branch.step_count,
            preview(&answer)
        );

        Ok(BranchOutcome {
            analyst: self.spec.name.clone(),
            answer,
            step_count: branch.step_count,
            tool_cycles,
            bound_reached,
            transitions,
            tool_failures,
        })
    }

    /// Invoke every requested call; results come back in request order
    async fn invoke_all(
        &self,
        calls: &[ToolCall],
        tools: &[Arc<dyn Tool>],
        input: &BranchInput,
    ) -> Vec<ToolResult> {
        let prepared: Vec<ToolCall> = calls
            .iter()
            .map(|call| with_image_ref(call, tools, &input.image_ref))
            .collect();

        join_all(
            prepared
                .iter()
                .map(|call| self.invoker.invoke(call, &self.spec)),
        )
        .await
    }

    /// One tool-less model call over the final-answer prompt
    async fn final_reasoning(
        &self,
        branch: &mut BranchState,
        input: &BranchInput,
    ) -> Result<String> {
        let kbs_knowledge = branch.knowledge.join("\n");
        let rendered = prompt::render(
            &self.spec.final_prompt_template,
            TemplateKind::FinalReasoning,
            &PromptValues {
                question: &input.question,
                context: &input.caption,
                candidates: &branch.answer_candidate,
                kbs_knowledge: &kbs_knowledge,
                llm_knowledge: &branch.llm_knowledge,
            },
        );
        if !rendered.unfilled.is_empty() {
            log::debug!(
                "Analyst {} final prompt left placeholders unfilled: {:?}",
                self.spec.name,
                rendered.unfilled
            );
        }

        let request = [Content::system(rendered.text), Content::user(FINAL_USER_TURN)];
        let config = GenerationConfig::with_temperature(FINAL_REASONING_TEMPERATURE);
        let response = self
            .model
            .generate_content(&request, Some(&config), None)
            .await?;

        let answer = response.text();
        branch.messages.push(response);
        Ok(answer)
    }
}

/// Visual-QA calls without an `image_url` argument get the run's image
fn with_image_ref(call: &ToolCall, tools: &[Arc<dyn Tool>], image_ref: &str) -> ToolCall {
    let is_vqa = tools
        .iter()
        .any(|t| t.name() == call.name && t.kind() == ToolKind::VisualQa);
    if !is_vqa {
        return call.clone();
    }

    let mut call = call.clone();
    match &mut call.arguments {
        Value::Object(args) => {
            let missing = args
                .get("image_url")
                .and_then(Value::as_str)
                .map_or(true, str::is_empty);
            if missing {
                args.insert("image_url".to_string(), Value::String(image_ref.to_string()));
            }
        }
        other => {
            *other = serde_json::json!({ "image_url": image_ref });
        }
    }
    call
}

/// Render a ranked candidate list as `a(0.99), b(0.70)`
pub fn candidates_text(payload: &Value) -> String {
    match payload {
        Value::Array(items) => items
            .iter()
            .map(|item| match (item.get("answer"), item.get("confidence")) {
                (Some(answer), Some(conf)) => format!(
                    "{}({:.2})",
                    answer.as_str().unwrap_or_default(),
                    conf.as_f64().unwrap_or_default()
                ),
                _ => value_text(item),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => value_text(other),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
