// SPDX-License-Identifier: MIT

//! Analyst descriptors
//!
//! Every branch is driven by an [`AnalystSpec`]. The three roles share one
//! shape and differ only in data: which tools they may call, how much their
//! vote weighs, and the prompt text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vire::tools::{ARXIV_TOOL, LLM_INSIGHT_TOOL, VQA_TOOL, WIKIPEDIA_TOOL};

/// Analyst seniority; fixes the vote weight and tie-break priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalystRole {
    Junior,
    Senior,
    Manager,
}

impl AnalystRole {
    /// Canonical analyst name used as the key of branch results
    pub fn name(&self) -> &'static str {
        match self {
            AnalystRole::Junior => "Junior",
            AnalystRole::Senior => "Senior",
            AnalystRole::Manager => "Manager",
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            AnalystRole::Junior => 2,
            AnalystRole::Senior => 3,
            AnalystRole::Manager => 4,
        }
    }

    /// Tie-break rank; lower wins
    pub fn priority(&self) -> u8 {
        match self {
            AnalystRole::Manager => 0,
            AnalystRole::Senior => 1,
            AnalystRole::Junior => 2,
        }
    }

    pub fn all() -> [AnalystRole; 3] {
        [AnalystRole::Junior, AnalystRole::Senior, AnalystRole::Manager]
    }
}

impl fmt::Display for AnalystRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static descriptor of one analyst branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystSpec {
    pub role: AnalystRole,
    pub name: String,
    pub description: String,
    /// Tool names this analyst may invoke
    pub tools: Vec<String>,
    pub weight: u32,
    /// System prompt of the tool-calling loop
    pub prompt_template: String,
    /// Prompt of the final-reasoning call
    pub final_prompt_template: String,
}

impl AnalystSpec {
    pub fn for_role(role: AnalystRole) -> Self {
        match role {
            AnalystRole::Junior => Self::junior(),
            AnalystRole::Senior => Self::senior(),
            AnalystRole::Manager => Self::manager(),
        }
    }

    /// The standard panel, in declaration order Junior, Senior, Manager
    pub fn defaults() -> Vec<AnalystSpec> {
        AnalystRole::all().into_iter().map(Self::for_role).collect()
    }

    pub fn junior() -> Self {
        Self::build(
            AnalystRole::Junior,
            "A junior analyst who relies on what is visible in the image.",
            &[VQA_TOOL],
            JUNIOR_PROMPT,
            CANDIDATES_FINAL_PROMPT,
        )
    }

    pub fn senior() -> Self {
        Self::build(
            AnalystRole::Senior,
            "A senior analyst who checks visual evidence against knowledge bases.",
            &[VQA_TOOL, WIKIPEDIA_TOOL, ARXIV_TOOL],
            SENIOR_PROMPT,
            KNOWLEDGE_FINAL_PROMPT,
        )
    }

    pub fn manager() -> Self {
        Self::build(
            AnalystRole::Manager,
            "A manager analyst with access to all tools including LLM-based knowledge generation.",
            &[VQA_TOOL, WIKIPEDIA_TOOL, ARXIV_TOOL, LLM_INSIGHT_TOOL],
            MANAGER_PROMPT,
            MANAGER_FINAL_PROMPT,
        )
    }

    fn build(
        role: AnalystRole,
        description: &str,
        tools: &[&str],
        prompt: &str,
        final_prompt: &str,
    ) -> Self {
        Self {
            role,
            name: role.name().to_string(),
            description: description.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            weight: role.weight(),
            prompt_template: prompt.to_string(),
            final_prompt_template: final_prompt.to_string(),
        }
    }

    /// Whether `tool_name` is in this analyst's capability set
    pub fn can_use(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }

    pub fn persona(&self) -> String {
        format!(
            "Name: {} Agent for VQA\nTools: {:?}\nDescription: {}",
            self.name, self.tools, self.description
        )
    }
}

const JUNIOR_PROMPT: &str = r#"You are **Junior Analyst**, answering questions about an image.

Call `vqa_tool` exactly once with the question to get ranked candidate answers,
then stop calling tools.

Context: {context}
Question: {question}"#;

const SENIOR_PROMPT: &str = r#"You are **Senior Analyst**, answering questions about an image that may need facts.

Available actions:
- Action_1: call `vqa_tool` for ranked candidate answers from the image.
- Action_2: call `wikipedia` or `arxiv` for background knowledge.

Rules:
1. Always begin with Action_1.
2. Add Action_2 only if the question needs factual or external knowledge.
3. Stop calling tools once you have what you need.

Context: {context}
Question: {question}"#;

const MANAGER_PROMPT: &str = r#"You are **Manager Planner**, an advanced agent that decides which actions to take for complex image-based Q&A tasks requiring reasoning and external knowledge.

Available actions:
- Action_1: call `vqa_tool` for ranked candidate answers from the image.
- Action_2: call `wikipedia` or `arxiv` for background knowledge.
- Action_3: call `llm_insight` for contextual insights from a language model.

Rules:
1. Always begin with Action_1.
2. Add Action_2 if the question requires factual or external knowledge.
3. Add Action_3 if deeper explanation, background, or reasoning is likely needed.

Context: {context}
Question: {question}"#;

const CANDIDATES_FINAL_PROMPT: &str = r#"Please answer the question according to the context and candidate answers.
======
Context: A close up of an elephant standing behind a cement wall.
Question: What item in the picture is purported to have a great memory?
Candidates: elephant(0.99), trunk(0.70), dumbo(0.09), brain(0.08), tusk(0.03)
Answer: elephant
======
Context: {context}.
Question: {question}.
Candidates: {candidates}.
Answer:"#;

const KNOWLEDGE_FINAL_PROMPT: &str = r#"Please answer the question according to the context, candidate answers and knowledge.
======
Context: A close up of an elephant standing behind a cement wall.
Question: What item in the picture is purported to have a great memory?
Candidates: elephant(0.99), trunk(0.70), dumbo(0.09), brain(0.08), tusk(0.03)
Knowledge: Elephants are known for their long memory and strong social bonds.
Answer: elephant
======
Context: {context}.
Question: {question}.
Candidates: {candidates}.
Knowledge: {KBs_knowledge}
Answer:"#;

const MANAGER_FINAL_PROMPT: &str = r#"Please answer the question according to the context, candidate answers, knowledge and insights.
======
Context: A close up of an elephant standing behind a cement wall.
Question: What item in the picture is purported to have a great memory?
Candidates: elephant(0.99), trunk(0.70), dumbo(0.09), brain(0.08), tusk(0.03)
Knowledge: Elephants are known for their long memory and strong social bonds.
Insights: The phrase "an elephant never forgets" refers to elephants.
Answer: elephant
======
Context: {context}.
Question: {question}.
Candidates: {candidates}.
Knowledge: {KBs_knowledge}
Insights: {LLM_knowledge}
Answer:"#;
