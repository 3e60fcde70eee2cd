// SPDX-License-Identifier: MIT

//! Weighted voting over the analysts' final answers
//!
//! Each analyst's raw text is reduced to one normalized token, the token
//! collects the analyst's weight, and the heaviest token wins. Equal tallies
//! go to the token of the highest-priority analyst (Manager, then Senior,
//! then Junior).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adk::error::VoteDiagnostic;
use crate::vire::analyst::AnalystSpec;
use crate::vire::workflow::state::BranchAnswer;

const ANSWER_MARKER: &str = "Answer:";
const TRIMMED: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '*', '`'];

/// One analyst's contribution to the vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalystVote {
    pub analyst: String,
    /// Normalized token; empty when extraction failed
    pub answer: String,
    pub weight: u32,
}

impl AnalystVote {
    pub fn counted(&self) -> bool {
        !self.answer.is_empty()
    }
}

/// Outcome of one aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub final_answer: String,
    pub vote_breakdown: BTreeMap<String, u32>,
    /// Per-analyst votes in declaration order
    pub agent_answers: Vec<AnalystVote>,
    /// Sum of every tallied weight
    pub total_votes: u32,
    pub diagnostic: Option<VoteDiagnostic>,
}

pub struct VoteAggregator {
    specs: Vec<Arc<AnalystSpec>>,
}

impl VoteAggregator {
    pub fn new(specs: Vec<Arc<AnalystSpec>>) -> Self {
        Self { specs }
    }

    /// Aggregator over the standard Junior/Senior/Manager panel
    pub fn standard() -> Self {
        Self::new(AnalystSpec::defaults().into_iter().map(Arc::new).collect())
    }

    /// Tally `results` by analyst name
    ///
    /// Results for names outside the panel are ignored, and of several results
    /// under one name the last is counted. Never fails: missing analysts yield
    /// an empty answer with a diagnostic, duplicates are counted with one, and
    /// an all-blank panel yields an empty answer without one.
    pub fn aggregate(&self, results: &[BranchAnswer]) -> VoteRecord {
        let matched: Vec<(&AnalystSpec, &BranchAnswer)> = self
            .specs
            .iter()
            .filter_map(|spec| {
                results
                    .iter()
                    .rev()
                    .find(|r| r.analyst_name == spec.name)
                    .map(|r| (spec.as_ref(), r))
            })
            .collect();

        if matched.len() < self.specs.len() {
            let diagnostic = VoteDiagnostic::InsufficientResults {
                expected: self.specs.len(),
                got: matched.len(),
            };
            log::warn!("Voting skipped: {}", diagnostic);
            return VoteRecord {
                diagnostic: Some(diagnostic),
                ..Default::default()
            };
        }

        let duplicate = self.specs.iter().find_map(|spec| {
            let count = results
                .iter()
                .filter(|r| r.analyst_name == spec.name)
                .count();
            (count > 1).then(|| VoteDiagnostic::DuplicateResults {
                analyst: spec.name.clone(),
                count,
            })
        });
        if let Some(diagnostic) = &duplicate {
            log::warn!("{}", diagnostic);
        }

        let agent_answers: Vec<AnalystVote> = matched
            .iter()
            .map(|(spec, result)| {
                let answer = extract_answer(&result.answer_text).unwrap_or_default();
                log::info!("{} (weight {}): '{}'", spec.name, spec.weight, answer);
                AnalystVote {
                    analyst: spec.name.clone(),
                    answer,
                    weight: spec.weight,
                }
            })
            .collect();

        let mut vote_breakdown = BTreeMap::new();
        for vote in agent_answers.iter().filter(|v| v.counted()) {
            *vote_breakdown.entry(vote.answer.clone()).or_insert(0) += vote.weight;
        }
        let total_votes = vote_breakdown.values().sum();

        let final_answer = self
            .winner(&agent_answers, &vote_breakdown)
            .unwrap_or_default();
        log::info!(
            "Vote breakdown: {:?} -> '{}'",
            vote_breakdown,
            final_answer
        );

        VoteRecord {
            final_answer,
            vote_breakdown,
            agent_answers,
            total_votes,
            diagnostic: duplicate,
        }
    }

    fn winner(
        &self,
        votes: &[AnalystVote],
        breakdown: &BTreeMap<String, u32>,
    ) -> Option<String> {
        let max = *breakdown.values().max()?;

        let mut by_priority: Vec<(&AnalystVote, u8)> = votes
            .iter()
            .filter(|v| v.counted())
            .filter_map(|v| {
                self.specs
                    .iter()
                    .find(|s| s.name == v.analyst)
                    .map(|s| (v, s.role.priority()))
            })
            .collect();
        by_priority.sort_by_key(|(_, priority)| *priority);

        by_priority
            .into_iter()
            .map(|(v, _)| v)
            .find(|v| breakdown.get(&v.answer) == Some(&max))
            .map(|v| v.answer.clone())
    }
}

/// Pull one normalized answer token out of an analyst's final text
///
/// The first word after the last `Answer:` marker that survives
/// normalization wins, so markdown emphasis around the marker is skipped. Without a marker the
/// last non-empty sentence is used if it has at most three words, then the
/// whole text under the same limit.
pub fn extract_answer(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let raw = match text.rfind(ANSWER_MARKER) {
        Some(idx) => {
            return text[idx + ANSWER_MARKER.len()..]
                .split_whitespace()
                .find_map(normalize_answer);
        }
        None => {
            let last = text
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .last()?;
            if last.split_whitespace().count() <= 3 {
                last
            } else if text.split_whitespace().count() <= 3 {
                text
            } else {
                return None;
            }
        }
    };
    normalize_answer(raw)
}

/// Lower-case and strip surrounding punctuation; `None` when nothing is left
pub fn normalize_answer(raw: &str) -> Option<String> {
    let token = raw.trim().trim_matches(TRIMMED).trim().to_lowercase();
    (!token.is_empty()).then_some(token)
}
