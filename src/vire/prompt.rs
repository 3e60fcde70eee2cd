// SPDX-License-Identifier: MIT

//! Prompt templates with a fixed set of placeholders
//!
//! Templates mark substitution points as `{key}`. Each template kind accepts
//! a known set of keys; anything else between braces is left in the text
//! untouched and reported back so the caller can log it.

use serde::Serialize;

/// A substitution key recognized in analyst templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placeholder {
    /// The user's question
    Question,
    /// The shared image caption (`{context}` or `{caption}`)
    Context,
    /// Rendered visual-QA candidates, e.g. `dog(0.97), wolf(0.40)`
    Candidates,
    /// Knowledge-base snippets joined by newlines
    KbsKnowledge,
    /// Model-generated background knowledge
    LlmKnowledge,
}

impl Placeholder {
    /// Map a template key to a placeholder; keys are matched case-insensitively
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "question" => Some(Self::Question),
            "context" | "caption" => Some(Self::Context),
            "candidates" => Some(Self::Candidates),
            "kbs_knowledge" => Some(Self::KbsKnowledge),
            "llm_knowledge" => Some(Self::LlmKnowledge),
            _ => None,
        }
    }
}

/// Which stage a template is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// System prompt of the tool-calling loop
    Planning,
    /// Prompt of the single final-reasoning call
    FinalReasoning,
}

impl TemplateKind {
    pub fn supported(&self) -> &'static [Placeholder] {
        match self {
            TemplateKind::Planning => &[Placeholder::Question, Placeholder::Context],
            TemplateKind::FinalReasoning => &[
                Placeholder::Question,
                Placeholder::Context,
                Placeholder::Candidates,
                Placeholder::KbsKnowledge,
                Placeholder::LlmKnowledge,
            ],
        }
    }
}

/// Values available for substitution
#[derive(Debug, Clone, Default)]
pub struct PromptValues<'a> {
    pub question: &'a str,
    pub context: &'a str,
    pub candidates: &'a str,
    pub kbs_knowledge: &'a str,
    pub llm_knowledge: &'a str,
}

impl<'a> PromptValues<'a> {
    fn value(&self, placeholder: Placeholder) -> &'a str {
        match placeholder {
            Placeholder::Question => self.question,
            Placeholder::Context => self.context,
            Placeholder::Candidates => self.candidates,
            Placeholder::KbsKnowledge => self.kbs_knowledge,
            Placeholder::LlmKnowledge => self.llm_knowledge,
        }
    }
}

/// Result of rendering a template
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub text: String,
    /// Brace keys left in place because the template kind does not support them
    pub unfilled: Vec<String>,
}

/// Substitute supported placeholders present in `template`
pub fn render(template: &str, kind: TemplateKind, values: &PromptValues<'_>) -> RenderedPrompt {
    let supported = kind.supported();
    let mut text = String::with_capacity(template.len());
    let mut unfilled = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let key_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let closed = key_len > 0 && after[key_len..].starts_with('}');

        if !closed {
            text.push('{');
            rest = after;
            continue;
        }

        let key = &after[..key_len];
        match Placeholder::from_key(key).filter(|p| supported.contains(p)) {
            Some(placeholder) => text.push_str(values.value(placeholder)),
            None => {
                text.push('{');
                text.push_str(key);
                text.push('}');
                unfilled.push(key.to_string());
            }
        }
        rest = &after[key_len + 1..];
    }
    text.push_str(rest);

    RenderedPrompt { text, unfilled }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> PromptValues<'static> {
        PromptValues {
            question: "What breed is the dog?",
            context: "A dog lying on grass",
            candidates: "husky(0.91), malamute(0.40)",
            kbs_knowledge: "Page: Husky",
            llm_knowledge: "Huskies are sled dogs",
        }
    }

    #[test]
    fn test_planning_fills_question_and_context() {
        let out = render(
            "Context: {context}\nQuestion: {question}",
            TemplateKind::Planning,
            &values(),
        );
        assert_eq!(
            out.text,
            "Context: A dog lying on grass\nQuestion: What breed is the dog?"
        );
        assert!(out.unfilled.is_empty());
    }

    #[test]
    fn test_caption_is_alias_for_context() {
        let out = render("{caption}", TemplateKind::Planning, &values());
        assert_eq!(out.text, "A dog lying on grass");
    }

    #[test]
    fn test_planning_leaves_final_only_keys_unfilled() {
        let out = render("Candidates: {candidates}", TemplateKind::Planning, &values());
        assert_eq!(out.text, "Candidates: {candidates}");
        assert_eq!(out.unfilled, vec!["candidates".to_string()]);
    }

    #[test]
    fn test_final_fills_all_keys() {
        let out = render(
            "{context}|{question}|{candidates}|{KBs_knowledge}|{LLM_knowledge}",
            TemplateKind::FinalReasoning,
            &values(),
        );
        assert_eq!(
            out.text,
            "A dog lying on grass|What breed is the dog?|husky(0.91), malamute(0.40)|Page: Husky|Huskies are sled dogs"
        );
    }

    #[test]
    fn test_unknown_keys_and_stray_braces_survive() {
        let out = render(
            "Format: [Action_1] {unknown} {not closed and {} and }",
            TemplateKind::FinalReasoning,
            &values(),
        );
        assert_eq!(
            out.text,
            "Format: [Action_1] {unknown} {not closed and {} and }"
        );
        assert_eq!(out.unfilled, vec!["unknown".to_string()]);
    }

    #[test]
    fn test_template_without_placeholders_is_unchanged() {
        let out = render("Answer briefly.", TemplateKind::FinalReasoning, &values());
        assert_eq!(out.text, "Answer briefly.");
    }
}
