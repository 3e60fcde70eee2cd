// SPDX-License-Identifier: MIT

//! State management for the analyst workflow
//!
//! This module provides:
//! - `StateField` / `MergePolicy` - the schema of shared state and how each field merges
//! - `WorkflowState` - the shared record, mutated only through `StateUpdate`s

mod schema;
mod store;

pub use schema::{MergePolicy, StateField};
pub use store::{BranchAnswer, StateUpdate, WorkflowState};
