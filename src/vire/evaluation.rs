// SPDX-License-Identifier: MIT

//! Exact-match accuracy over a labelled dataset

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::adk::error::{Result, VireError};
use crate::vire::workflow::engine::WorkflowEngine;
use crate::vire::workflow::voting::normalize_answer;

/// One labelled question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub question: String,
    /// Image URL or local path
    pub image: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    pub question: String,
    pub prediction: String,
    pub reference: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub results: Vec<SampleResult>,
    pub accuracy: Accuracy,
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>> {
    let content = fs::read_to_string(path)?;
    parse_dataset(&content)
}

/// Parse a YAML list of `{question, image, answer}`
pub fn parse_dataset(content: &str) -> Result<Vec<Sample>> {
    let samples: Vec<Sample> = serde_yaml::from_str(content)?;
    Ok(samples)
}

fn matches(prediction: &str, reference: &str) -> bool {
    match (normalize_answer(prediction), normalize_answer(reference)) {
        (Some(p), Some(r)) => p == r,
        _ => false,
    }
}

/// Fraction of predictions equal to their reference after normalization
pub fn evaluate_accuracy(predictions: &[String], references: &[String]) -> Result<Accuracy> {
    if predictions.len() != references.len() {
        return Err(VireError::other(format!(
            "{} predictions for {} references",
            predictions.len(),
            references.len()
        )));
    }

    let correct = predictions
        .iter()
        .zip(references)
        .filter(|(p, r)| matches(p, r))
        .count();
    let total = references.len();
    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };
    Ok(Accuracy {
        correct,
        total,
        accuracy,
    })
}

/// Run the workflow on every sample in turn
///
/// A sample whose run fails counts as a wrong, empty prediction.
pub async fn evaluate_dataset(
    engine: &WorkflowEngine,
    samples: &[Sample],
) -> Result<EvaluationReport> {
    let mut results = Vec::with_capacity(samples.len());

    for (i, sample) in samples.iter().enumerate() {
        let thread_id = format!("eval_{}", i + 1);
        let prediction = match engine
            .run_workflow(&sample.question, &sample.image, &thread_id)
            .await
        {
            Ok(outcome) => outcome.final_answer,
            Err(e) => {
                log::error!("Sample {} failed: {}", i + 1, e);
                String::new()
            }
        };
        let correct = matches(&prediction, &sample.answer);
        log::info!(
            "Sample {}: predicted '{}', expected '{}'",
            i + 1,
            prediction,
            sample.answer
        );
        results.push(SampleResult {
            question: sample.question.clone(),
            prediction,
            reference: sample.answer.clone(),
            correct,
        });
    }

    let predictions: Vec<String> = results.iter().map(|r| r.prediction.clone()).collect();
    let references: Vec<String> = results.iter().map(|r| r.reference.clone()).collect();
    let accuracy = evaluate_accuracy(&predictions, &references)?;
    Ok(EvaluationReport { results, accuracy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{Content, GenerationConfig, Model, Part};
    use crate::adk::tool::Tool;
    use crate::vire::analyst::AnalystSpec;
    use crate::vire::tools::caption::Captioner;
    use crate::vire::workflow::invoker::ToolInvoker;
    use crate::vire::workflow::registry::ToolRegistry;
    use crate::vire::workflow::scheduler::BranchScheduler;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Captions everything except `missing.jpg`
    struct PickyCaptioner;

    #[async_trait]
    impl Captioner for PickyCaptioner {
        async fn caption(&self, image_ref: &str) -> Result<String> {
            if image_ref == "missing.jpg" {
                return Err(VireError::other("no such file"));
            }
            Ok("A dog on grass".to_string())
        }
    }

    struct DogModel;

    #[async_trait]
    impl Model for DogModel {
        async fn generate_content(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content> {
            Ok(Content {
                role: "model".to_string(),
                parts: vec![Part::Text("Answer: dog".to_string())],
            })
        }
    }

    fn sample(image: &str, answer: &str) -> Sample {
        Sample {
            question: "What animal is this?".to_string(),
            image: image.to_string(),
            answer: answer.to_string(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accuracy_normalizes_case_and_punctuation() {
        let acc = evaluate_accuracy(
            &strings(&["Dog.", "cat", "red"]),
            &strings(&["dog", "Cat", "blue"]),
        )
        .unwrap();
        assert_eq!(acc.correct, 2);
        assert_eq!(acc.total, 3);
        assert!((acc.accuracy - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_prediction_never_matches() {
        let acc = evaluate_accuracy(&strings(&[""]), &strings(&[""])).unwrap();
        assert_eq!(acc.correct, 0);
    }

    #[test]
    fn test_empty_dataset_has_zero_accuracy() {
        let acc = evaluate_accuracy(&[], &[]).unwrap();
        assert_eq!(acc.total, 0);
        assert_eq!(acc.accuracy, 0.0);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        assert!(evaluate_accuracy(&strings(&["a"]), &[]).is_err());
    }

    #[tokio::test]
    async fn test_failed_run_counts_as_wrong_empty_prediction() {
        let scheduler =
            BranchScheduler::new(Arc::new(DogModel), ToolInvoker::new(ToolRegistry::new()));
        let engine = WorkflowEngine::new(
            Arc::new(PickyCaptioner),
            scheduler,
            AnalystSpec::defaults(),
        );

        let report = evaluate_dataset(
            &engine,
            &[sample("dog.jpg", "Dog"), sample("missing.jpg", "dog")],
        )
        .await
        .unwrap();

        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].correct);
        assert_eq!(report.results[1].prediction, "");
        assert!(!report.results[1].correct);
        assert_eq!(report.accuracy.correct, 1);
        assert_eq!(report.accuracy.total, 2);
    }

    #[test]
    fn test_parse_dataset() {
        let yaml = r#"
- question: What color is the dog's fur?
  image: https://example.com/1.jpg
  answer: brown
- question: What breed might this dog be?
  image: ./images/1.jpg
  answer: husky
"#;
        let samples = parse_dataset(yaml).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].image, "./images/1.jpg");
        assert_eq!(samples[0].answer, "brown");
    }
}
