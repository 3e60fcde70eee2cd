// SPDX-License-Identifier: MIT

//! Typed error handling for vire-rs
//!
//! Fatal errors travel as [`VireError`]. Failures that a run recovers from
//! (a tool call going wrong, a branch dying, too few votes) are plain values
//! carried in results so callers and tests can match on their kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, VireError>;

/// Top-level error type for vire-rs
#[derive(Debug, Error)]
pub enum VireError {
    /// API errors from external services (model endpoint, Wikipedia, arXiv)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Configuration errors (missing env vars, invalid config values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow-level errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Shared state merge violations
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// XML feed parsing errors
    #[error("XML error: {0}")]
    Xml(String),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The captioning stage failed; no branch can run without a caption
    #[error("Captioning failed for '{image_ref}': {detail}")]
    Captioning { image_ref: String, detail: String },
}

/// Violations of a field's merge policy
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    /// A write-once field was written a second time
    #[error("field '{field}' is write-once and already holds a value")]
    AlreadyWritten { field: &'static str },

    /// The field is fixed at construction and never accepts updates
    #[error("field '{field}' is immutable after creation")]
    Immutable { field: &'static str },
}

/// Why a single tool call did not produce a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// No tool with that name is registered
    NotFound,
    /// The tool exists but the calling analyst may not use it
    NotPermitted,
    /// The tool ran and returned an error
    Raised,
    /// The tool did not answer within the configured timeout
    TimedOut,
}

/// Structured tool failure, folded back into a branch as an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub detail: String,
}

impl ToolFailure {
    pub fn new(kind: ToolFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

/// Why a branch produced no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchFailureKind {
    /// The model call returned an error
    Model,
    /// The branch task panicked
    Panicked,
    /// The branch did not finish before the fan-in deadline
    TimedOut,
}

/// Structured branch failure; the branch still takes part in the vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub kind: BranchFailureKind,
    pub detail: String,
}

impl BranchFailure {
    pub fn new(kind: BranchFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

/// Anomaly in the vote's input, reported alongside the record
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteDiagnostic {
    /// Fewer branch results than analysts reached the vote
    #[error("Insufficient results: expected={expected}, got={got}")]
    InsufficientResults { expected: usize, got: usize },
    /// Several results carried one analyst's name; only the last was counted
    #[error("Duplicate results for {analyst}: got {count}, counted the last")]
    DuplicateResults { analyst: String, count: usize },
}

impl VireError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for VireError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for VireError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<quick_xml::Error> for VireError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}
