// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};

/// How updates to a field are merged into shared state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Set when the state is created; every update is rejected
    Fixed,
    /// Accepts exactly one update
    WriteOnce,
    /// Every update is appended to a list
    Append,
    /// Each update replaces the previous value
    Overwrite,
}

/// Fields of the shared workflow state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Question,
    ImageRef,
    Caption,
    BranchResults,
    FinalAnswer,
    VoteBreakdown,
    /// Name of the last stage whose output was merged
    Stage,
}

impl StateField {
    pub fn name(&self) -> &'static str {
        match self {
            StateField::Question => "question",
            StateField::ImageRef => "image_ref",
            StateField::Caption => "caption",
            StateField::BranchResults => "branch_results",
            StateField::FinalAnswer => "final_answer",
            StateField::VoteBreakdown => "vote_breakdown",
            StateField::Stage => "stage",
        }
    }

    pub fn policy(&self) -> MergePolicy {
        match self {
            StateField::Question | StateField::ImageRef => MergePolicy::Fixed,
            StateField::Caption | StateField::FinalAnswer | StateField::VoteBreakdown => {
                MergePolicy::WriteOnce
            }
            StateField::BranchResults => MergePolicy::Append,
            StateField::Stage => MergePolicy::Overwrite,
        }
    }

    pub fn all() -> [StateField; 7] {
        [
            StateField::Question,
            StateField::ImageRef,
            StateField::Caption,
            StateField::BranchResults,
            StateField::FinalAnswer,
            StateField::VoteBreakdown,
            StateField::Stage,
        ]
    }
}
