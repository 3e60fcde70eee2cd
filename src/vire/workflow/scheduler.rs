// SPDX-License-Identifier: MIT

//! Fan-out/fan-in of analyst branches
//!
//! One tokio task per analyst. The scheduler waits for every task (or the
//! overall deadline) and reports in analyst declaration order, whatever the
//! completion order was.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::adk::error::{BranchFailure, BranchFailureKind, Result};
use crate::adk::model::Model;
use crate::vire::analyst::AnalystSpec;
use crate::vire::workflow::branch::{
    AnalystLoop, BranchInput, BranchOutcome, DEFAULT_MAX_TOOL_CYCLES,
};
use crate::vire::workflow::invoker::ToolInvoker;
use crate::vire::workflow::state::BranchAnswer;

/// What one branch produced, or why it produced nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchReport {
    pub analyst: String,
    /// Final answer text; empty when the branch failed
    pub answer: String,
    pub outcome: Option<BranchOutcome>,
    pub failure: Option<BranchFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BranchReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn to_answer(&self) -> BranchAnswer {
        BranchAnswer::new(self.analyst.clone(), self.answer.clone())
    }
}

/// Runs one [`AnalystLoop`] per analyst concurrently
pub struct BranchScheduler {
    model: Arc<dyn Model>,
    invoker: ToolInvoker,
    max_tool_cycles: u32,
    timeout: Option<Duration>,
}

impl BranchScheduler {
    pub fn new(model: Arc<dyn Model>, invoker: ToolInvoker) -> Self {
        Self {
            model,
            invoker,
            max_tool_cycles: DEFAULT_MAX_TOOL_CYCLES,
            timeout: None,
        }
    }

    pub fn with_max_tool_cycles(mut self, max_tool_cycles: u32) -> Self {
        self.max_tool_cycles = max_tool_cycles;
        self
    }

    /// Deadline for the whole fan-in; unfinished branches are aborted and
    /// reported as timed out
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run every analyst to completion and report in `specs` order
    pub async fn run(&self, input: BranchInput, specs: &[Arc<AnalystSpec>]) -> Vec<BranchReport> {
        let input = Arc::new(input);
        let deadline = self.timeout.map(|t| Instant::now() + t);
        log::info!("Fanning out to {} analysts", specs.len());

        let started: Vec<(String, DateTime<Utc>, JoinHandle<Result<BranchOutcome>>)> = specs
            .iter()
            .map(|spec| {
                let analyst =
                    AnalystLoop::new(spec.clone(), self.model.clone(), self.invoker.clone())
                        .with_max_tool_cycles(self.max_tool_cycles);
                let input = input.clone();
                let handle = tokio::spawn(async move { analyst.run(&input).await });
                (spec.name.clone(), Utc::now(), handle)
            })
            .collect();

        join_all(
            started
                .into_iter()
                .map(|(analyst, started_at, handle)| async move {
                    let settled = settle(handle, deadline).await;
                    let finished_at = Utc::now();
                    match settled {
                        Ok(outcome) => BranchReport {
                            analyst,
                            answer: outcome.answer.clone(),
                            outcome: Some(outcome),
                            failure: None,
                            started_at,
                            finished_at,
                        },
                        Err(failure) => {
                            log::error!("Analyst {} failed: {}", analyst, failure);
                            BranchReport {
                                analyst,
                                answer: String::new(),
                                outcome: None,
                                failure: Some(failure),
                                started_at,
                                finished_at,
                            }
                        }
                    }
                }),
        )
        .await
    }
}

async fn settle(
    handle: JoinHandle<Result<BranchOutcome>>,
    deadline: Option<Instant>,
) -> std::result::Result<BranchOutcome, BranchFailure> {
    let abort = handle.abort_handle();
    let joined = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                return Err(BranchFailure::new(
                    BranchFailureKind::TimedOut,
                    "branch did not finish before the fan-in deadline",
                ));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(BranchFailure::new(BranchFailureKind::Model, e.to_string())),
        Err(e) => Err(BranchFailure::new(BranchFailureKind::Panicked, e.to_string())),
    }
}
