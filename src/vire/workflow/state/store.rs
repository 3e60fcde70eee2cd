// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::schema::{MergePolicy, StateField};
use crate::adk::error::StateError;

/// One branch's contribution to shared state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAnswer {
    pub analyst_name: String,
    pub answer_text: String,
}

impl BranchAnswer {
    pub fn new(analyst_name: impl Into<String>, answer_text: impl Into<String>) -> Self {
        Self {
            analyst_name: analyst_name.into(),
            answer_text: answer_text.into(),
        }
    }
}

/// A partial update produced by a stage
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Caption(String),
    BranchResult(BranchAnswer),
    FinalAnswer(String),
    VoteBreakdown(BTreeMap<String, u32>),
    Stage(String),
}

impl StateUpdate {
    pub fn field(&self) -> StateField {
        match self {
            StateUpdate::Caption(_) => StateField::Caption,
            StateUpdate::BranchResult(_) => StateField::BranchResults,
            StateUpdate::FinalAnswer(_) => StateField::FinalAnswer,
            StateUpdate::VoteBreakdown(_) => StateField::VoteBreakdown,
            StateUpdate::Stage(_) => StateField::Stage,
        }
    }
}

/// Shared record threaded through a run
///
/// Only [`WorkflowState::apply`] mutates it, and every update goes through
/// the field's [`MergePolicy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowState {
    question: String,
    image_ref: String,
    caption: Option<String>,
    branch_results: Vec<BranchAnswer>,
    final_answer: Option<String>,
    vote_breakdown: Option<BTreeMap<String, u32>>,
    stage: Option<String>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            image_ref: image_ref.into(),
            caption: None,
            branch_results: Vec::new(),
            final_answer: None,
            vote_breakdown: None,
            stage: None,
        }
    }

    /// Merge one update according to its field's policy
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), StateError> {
        let field = update.field();
        match field.policy() {
            MergePolicy::Fixed => {
                return Err(StateError::Immutable {
                    field: field.name(),
                })
            }
            MergePolicy::WriteOnce if self.is_written(field) => {
                return Err(StateError::AlreadyWritten {
                    field: field.name(),
                })
            }
            MergePolicy::WriteOnce | MergePolicy::Append | MergePolicy::Overwrite => {}
        }

        match update {
            StateUpdate::Caption(caption) => self.caption = Some(caption),
            StateUpdate::BranchResult(answer) => self.branch_results.push(answer),
            StateUpdate::FinalAnswer(answer) => self.final_answer = Some(answer),
            StateUpdate::VoteBreakdown(breakdown) => self.vote_breakdown = Some(breakdown),
            StateUpdate::Stage(stage) => self.stage = Some(stage),
        }
        Ok(())
    }

    /// Merge a batch of updates in order, stopping at the first violation
    pub fn merge<I>(&mut self, updates: I) -> Result<(), StateError>
    where
        I: IntoIterator<Item = StateUpdate>,
    {
        for update in updates {
            self.apply(update)?;
        }
        Ok(())
    }

    /// Whether a field currently holds a value
    pub fn is_written(&self, field: StateField) -> bool {
        match field {
            StateField::Question | StateField::ImageRef => true,
            StateField::Caption => self.caption.is_some(),
            StateField::BranchResults => !self.branch_results.is_empty(),
            StateField::FinalAnswer => self.final_answer.is_some(),
            StateField::VoteBreakdown => self.vote_breakdown.is_some(),
            StateField::Stage => self.stage.is_some(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn branch_results(&self) -> &[BranchAnswer] {
        &self.branch_results
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn vote_breakdown(&self) -> Option<&BTreeMap<String, u32>> {
        self.vote_breakdown.as_ref()
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    /// Convert state to a JSON object (checkpoint snapshots)
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
