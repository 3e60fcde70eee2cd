// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::caption::image_source;
use super::VQA_TOOL;
use crate::adk::error::{Result, VireError};
use crate::adk::model::{Content, GenerationConfig, Model, Part};
use crate::adk::tool::{Tool, ToolKind};

static VQA_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The question to answer about the image"
            },
            "image_url": {
                "type": "string",
                "description": "Image URL or path; defaults to the image under analysis"
            }
        },
        "required": ["question"]
    })
});

const VQA_PROMPT: &str = r#"You are a Visual Question Answering system.
Given an image and a question, propose the top 5 candidate answers, each with a confidence score (from 0.00 to 1.00), sorted in descending order.
- Base your answers only on clearly visible information in the image, without any external inference.
- Output only one line in the following exact format:
Candidates: answer1(score1), answer2(score2), answer3(score3), answer4(score4), answer5(score5)

Example 1:
Question: What color is the car in the image?
Candidates: red(0.98), orange(0.75), yellow(0.40), brown(0.15), white(0.05)

Example 2:
Question: How many people are visible?
Candidates: two(0.92), three(0.60), one(0.30), four(0.10), zero(0.02)

Now apply to the new case:

Question: {question}
Answer:"#;

#[derive(Debug, Deserialize)]
struct VqaArgs {
    question: String,
    #[serde(default)]
    image_url: Option<String>,
}

/// One ranked answer proposed by the visual-QA model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub answer: String,
    pub confidence: f64,
}

/// Visual question answering over a vision-capable model
pub struct VisualQaTool {
    model: Arc<dyn Model>,
}

impl VisualQaTool {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Tool for VisualQaTool {
    fn name(&self) -> &str {
        VQA_TOOL
    }

    fn description(&self) -> &str {
        "Answers a question about the image. Returns the top candidate answers with confidence scores."
    }

    fn schema(&self) -> &Value {
        &VQA_SCHEMA
    }

    fn kind(&self) -> ToolKind {
        ToolKind::VisualQa
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: VqaArgs = serde_json::from_value(input)?;
        let image_url = args
            .image_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| VireError::other("vqa_tool needs an image_url"))?;

        let prompt = VQA_PROMPT.replace("{question}", args.question.trim());
        let request = [Content {
            role: "user".to_string(),
            parts: vec![
                Part::Text(prompt),
                Part::Image {
                    url: image_source(&image_url).await?,
                },
            ],
        }];
        let config = GenerationConfig {
            temperature: Some(0.2),
            top_p: Some(0.5),
            max_output_tokens: Some(512),
        };

        let response = self
            .model
            .generate_content(&request, Some(&config), None)
            .await?;
        let text = response.text();

        let candidates = parse_candidates(&text);
        if candidates.is_empty() {
            return Err(VireError::other(format!(
                "no candidates in visual-QA response: {}",
                text.trim()
            )));
        }
        Ok(serde_json::to_value(candidates)?)
    }
}

/// Parse the last `Candidates: a(0.98), b(0.75)` line, highest confidence first
///
/// Entries without a readable score get confidence 0.
pub fn parse_candidates(text: &str) -> Vec<Candidate> {
    let Some(start) = text.rfind("Candidates:") else {
        return Vec::new();
    };
    let line = text[start + "Candidates:".len()..]
        .lines()
        .next()
        .unwrap_or_default();

    let mut candidates: Vec<Candidate> = line
        .split(',')
        .filter_map(|item| {
            let item = item.trim().trim_end_matches('.');
            if item.is_empty() {
                return None;
            }
            let parsed = item
                .strip_suffix(')')
                .and_then(|rest| rest.rsplit_once('('))
                .and_then(|(answer, score)| {
                    score
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .map(|c| (answer.trim(), c))
                });
            let (answer, confidence) = parsed.unwrap_or((item, 0.0));
            if answer.is_empty() {
                None
            } else {
                Some(Candidate {
                    answer: answer.to_string(),
                    confidence,
                })
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedVision {
        reply: &'static str,
        seen: Mutex<Option<(Vec<Content>, Option<f32>)>>,
    }

    #[async_trait]
    impl Model for FixedVision {
        async fn generate_content(
            &self,
            history: &[Content],
            config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content> {
            *self.seen.lock().unwrap() =
                Some((history.to_vec(), config.and_then(|c| c.temperature)));
            Ok(Content {
                role: "model".to_string(),
                parts: vec![Part::Text(self.reply.to_string())],
            })
        }
    }

    #[test]
    fn test_parse_candidates_sorted_descending() {
        let parsed = parse_candidates("Candidates: trunk(0.70), elephant(0.99), tusk(0.03)");
        let answers: Vec<&str> = parsed.iter().map(|c| c.answer.as_str()).collect();
        assert_eq!(answers, vec!["elephant", "trunk", "tusk"]);
        assert_eq!(parsed[0].confidence, 0.99);
    }

    #[test]
    fn test_parse_candidates_uses_last_marker_and_first_line() {
        let text = "Example Candidates: red(0.98)\nCandidates: brown(0.8), black(0.1)\nextra";
        let parsed = parse_candidates(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].answer, "brown");
    }

    #[test]
    fn test_parse_candidates_tolerates_missing_scores() {
        let parsed = parse_candidates("Candidates: fire hydrant(0.6), hydrant");
        assert_eq!(
            parsed,
            vec![
                Candidate {
                    answer: "fire hydrant".to_string(),
                    confidence: 0.6
                },
                Candidate {
                    answer: "hydrant".to_string(),
                    confidence: 0.0
                },
            ]
        );
    }

    #[test]
    fn test_parse_candidates_without_marker() {
        assert!(parse_candidates("I cannot tell.").is_empty());
    }

    #[tokio::test]
    async fn test_execute_returns_ranked_list() {
        let model = Arc::new(FixedVision {
            reply: "Candidates: husky(0.91), wolf(0.20)",
            seen: Mutex::new(None),
        });
        let tool = VisualQaTool::new(model.clone());

        let out = tool
            .execute(json!({"question": "What animal?", "image_url": "https://example.com/a.jpg"}))
            .await
            .unwrap();

        assert_eq!(out[0]["answer"], "husky");
        assert_eq!(out[1]["answer"], "wolf");

        let (history, temperature) = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(temperature, Some(0.2));
        assert!(history[0].text().contains("Question: What animal?"));
    }

    #[tokio::test]
    async fn test_execute_without_image_fails() {
        let tool = VisualQaTool::new(Arc::new(FixedVision {
            reply: "",
            seen: Mutex::new(None),
        }));
        assert!(tool.execute(json!({"question": "What?"})).await.is_err());
    }
}
