// SPDX-License-Identifier: MIT

//! Workflow engine - caption, fan out to the analysts, vote
//!
//! The engine owns the run's [`WorkflowState`] and is the only place branch
//! output is merged into it. Captioning failure aborts the run; everything
//! after it degrades instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adk::error::{Result, WorkflowError};
use crate::adk::model::Model;
use crate::vire::analyst::AnalystSpec;
use crate::vire::tools::caption::{Captioner, ModelCaptioner};
use crate::vire::tools::default_registry;
use crate::vire::workflow::branch::BranchInput;
use crate::vire::workflow::checkpoint::{
    create_thread_config, Checkpoint, Checkpointer, FileCheckpointer, MemoryCheckpointer,
    ThreadConfig,
};
use crate::vire::workflow::config::VireConfig;
use crate::vire::workflow::invoker::ToolInvoker;
use crate::vire::workflow::scheduler::{BranchReport, BranchScheduler};
use crate::vire::workflow::state::{BranchAnswer, StateUpdate, WorkflowState};
use crate::vire::workflow::voting::{VoteAggregator, VoteRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// Finished without a usable result (failed branch, vote diagnostic)
    Degraded,
}

/// One entry of a run's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub status: StageStatus,
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageRecord {
    fn completed(stage: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Completed,
            detail: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn for_branch(report: &BranchReport) -> Self {
        let (status, detail) = match &report.failure {
            Some(failure) => (StageStatus::Degraded, Some(failure.to_string())),
            None => (StageStatus::Completed, None),
        };
        Self {
            stage: format!("analyst:{}", report.analyst),
            status,
            detail,
            started_at: report.started_at,
            finished_at: report.finished_at,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub thread_id: String,
    pub caption: String,
    pub final_answer: String,
    pub vote_breakdown: BTreeMap<String, u32>,
    pub per_branch_results: Vec<BranchAnswer>,
    pub voting: VoteRecord,
    pub branches: Vec<BranchReport>,
    pub trail: Vec<StageRecord>,
}

pub struct WorkflowEngine {
    captioner: Arc<dyn Captioner>,
    scheduler: BranchScheduler,
    specs: Vec<Arc<AnalystSpec>>,
    aggregator: VoteAggregator,
    /// Store shared by every run; without one each run gets its own
    /// in-memory store, dropped when the run returns
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl WorkflowEngine {
    pub fn new(
        captioner: Arc<dyn Captioner>,
        scheduler: BranchScheduler,
        specs: Vec<AnalystSpec>,
    ) -> Self {
        let specs: Vec<Arc<AnalystSpec>> = specs.into_iter().map(Arc::new).collect();
        Self {
            captioner,
            scheduler,
            aggregator: VoteAggregator::new(specs.clone()),
            specs,
            checkpointer: None,
        }
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Standard panel and tools over one model, wired from `config`
    pub async fn from_config(config: &VireConfig, model: Arc<dyn Model>) -> Self {
        let registry = default_registry(model.clone(), &config.tools).await;
        log::info!("Registered tools: {:?}", registry.names().await);
        let invoker = ToolInvoker::new(registry).with_timeout(config.engine.tool_timeout());
        let scheduler = BranchScheduler::new(model.clone(), invoker)
            .with_max_tool_cycles(config.engine.max_tool_cycles)
            .with_timeout(config.engine.branch_timeout());

        let engine = Self::new(
            Arc::new(ModelCaptioner::new(model)),
            scheduler,
            AnalystSpec::defaults(),
        );
        match &config.checkpoint_dir {
            Some(dir) => engine.with_checkpointer(Arc::new(FileCheckpointer::new(dir))),
            None => engine,
        }
    }

    /// Answer `question` about `image_ref`
    ///
    /// Only a captioning failure returns `Err`; failed branches and missing
    /// votes show up in the outcome instead.
    pub async fn run_workflow(
        &self,
        question: &str,
        image_ref: &str,
        thread_id: &str,
    ) -> Result<RunOutcome> {
        let thread = create_thread_config(thread_id);
        let checkpointer: Arc<dyn Checkpointer> = match &self.checkpointer {
            Some(shared) => shared.clone(),
            None => Arc::new(MemoryCheckpointer::new()),
        };
        let mut state = WorkflowState::new(question, image_ref);
        let mut trail = Vec::new();
        log::info!("Run {} started: '{}'", thread.thread_id, question);

        let started = Utc::now();
        let caption = match self.captioner.caption(image_ref).await {
            Ok(caption) => caption,
            Err(e) => {
                log::error!("Captioning failed for {}: {}", image_ref, e);
                return Err(WorkflowError::Captioning {
                    image_ref: image_ref.to_string(),
                    detail: e.to_string(),
                }
                .into());
            }
        };
        state.merge([
            StateUpdate::Caption(caption.clone()),
            StateUpdate::Stage("caption".to_string()),
        ])?;
        trail.push(StageRecord::completed("caption", started));
        checkpoint(checkpointer.as_ref(), &thread, "caption", &state).await;

        let input = BranchInput {
            question: question.to_string(),
            image_ref: image_ref.to_string(),
            caption: caption.clone(),
        };
        let branches = self.scheduler.run(input, &self.specs).await;
        for report in &branches {
            state.apply(StateUpdate::BranchResult(report.to_answer()))?;
            trail.push(StageRecord::for_branch(report));
        }
        state.apply(StateUpdate::Stage("fan_in".to_string()))?;
        checkpoint(checkpointer.as_ref(), &thread, "fan_in", &state).await;

        let started = Utc::now();
        let voting = self.aggregator.aggregate(state.branch_results());
        state.merge([
            StateUpdate::FinalAnswer(voting.final_answer.clone()),
            StateUpdate::VoteBreakdown(voting.vote_breakdown.clone()),
            StateUpdate::Stage("voting".to_string()),
        ])?;
        trail.push(match &voting.diagnostic {
            Some(diagnostic) => StageRecord {
                status: StageStatus::Degraded,
                detail: Some(diagnostic.to_string()),
                ..StageRecord::completed("voting", started)
            },
            None => StageRecord::completed("voting", started),
        });
        checkpoint(checkpointer.as_ref(), &thread, "voting", &state).await;

        log::info!(
            "Run {} finished: '{}' {:?}",
            thread.thread_id,
            voting.final_answer,
            voting.vote_breakdown
        );

        Ok(RunOutcome {
            thread_id: thread.thread_id,
            caption,
            final_answer: voting.final_answer.clone(),
            vote_breakdown: voting.vote_breakdown.clone(),
            per_branch_results: state.branch_results().to_vec(),
            voting,
            branches,
            trail,
        })
    }

}

async fn checkpoint(
    checkpointer: &dyn Checkpointer,
    thread: &ThreadConfig,
    stage: &str,
    state: &WorkflowState,
) {
    if let Err(e) = checkpointer
        .save(thread, Checkpoint::new(stage, state.to_json()))
        .await
    {
        log::warn!(
            "Checkpoint '{}' for thread {} not saved: {}",
            stage,
            thread.thread_id,
            e
        );
    }
}
