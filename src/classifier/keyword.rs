//! Keyword-based intent classification
//!
//! Deterministic fallback strategy: scores each enabled workflow against
//! the query tokens. No network calls, identical queries always classify
//! identically.

use crate::classifier::{Classification, Classifier};
use crate::error::RouterResult;
use crate::registry::WorkflowSummary;
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::debug;

/// Deterministic keyword classifier
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    /// Minimum score a workflow must reach to be selected
    min_score: u32,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self { min_score: 1 }
    }

    /// Require a higher minimum score before matching
    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }

    fn tokenize(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .map(str::to_string)
            .collect()
    }

    /// Score a workflow against the query tokens (pure function)
    ///
    /// Category and tag hits weigh more than description hits; id
    /// segments count so "support" matches "customer-support".
    fn score(query_tokens: &HashSet<String>, workflow: &WorkflowSummary) -> u32 {
        let mut score = 0;

        for segment in workflow.id.to_lowercase().split(['-', '_', '.']) {
            if query_tokens.contains(segment) {
                score += 2;
            }
        }

        if let Some(ref category) = workflow.category {
            if query_tokens.contains(&category.to_lowercase()) {
                score += 2;
            }
        }

        for tag in &workflow.tags {
            if query_tokens.contains(&tag.to_lowercase()) {
                score += 2;
            }
        }

        if let Some(ref description) = workflow.description {
            let description_tokens = Self::tokenize(description);
            score += query_tokens.intersection(&description_tokens).count() as u32;
        }

        score
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
        catalog: &[WorkflowSummary],
    ) -> RouterResult<Classification> {
        let mut full_text = query.to_string();
        if let Some(context) = context {
            for value in context.values() {
                full_text.push(' ');
                full_text.push_str(value);
            }
        }

        let query_tokens = Self::tokenize(&full_text);

        let mut best: Option<(&WorkflowSummary, u32)> = None;
        for workflow in catalog {
            let score = Self::score(&query_tokens, workflow);
            if score < self.min_score {
                continue;
            }

            // Tie-break by id ordering for determinism
            best = match best {
                Some((current, current_score))
                    if score < current_score
                        || (score == current_score && workflow.id >= current.id) =>
                {
                    Some((current, current_score))
                }
                _ => Some((workflow, score)),
            };
        }

        match best {
            Some((workflow, score)) => {
                debug!(
                    workflow_id = %workflow.id,
                    score,
                    "Keyword classification matched"
                );
                Ok(Classification::matched(workflow.id.clone())
                    .with_reasoning(format!("keyword score {score}")))
            }
            None => Ok(Classification::no_match()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WorkflowKind;

    fn summary(id: &str, category: &str, description: &str, tags: &[&str]) -> WorkflowSummary {
        WorkflowSummary {
            id: id.to_string(),
            name: id.to_string(),
            category: Some(category.to_string()),
            description: Some(description.to_string()),
            kind: WorkflowKind::Prompt,
            enabled: true,
            version: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn catalog() -> Vec<WorkflowSummary> {
        vec![
            summary(
                "customer-support",
                "support",
                "Handles order issues, returns and customer assistance",
                &["order", "refund"],
            ),
            summary(
                "sales-inquiry",
                "sales",
                "Handles pricing and purchase questions",
                &["pricing", "buy"],
            ),
            summary(
                "technical-support",
                "engineering",
                "API integration help and troubleshooting",
                &["api"],
            ),
        ]
    }

    #[tokio::test]
    async fn test_order_query_matches_customer_support() {
        let classifier = KeywordClassifier::new();
        let classification = classifier
            .classify("I need help with my order #12345", None, &catalog())
            .await
            .unwrap();

        assert_eq!(
            classification.workflow_id.as_deref(),
            Some("customer-support")
        );
    }

    #[tokio::test]
    async fn test_api_query_matches_technical_support() {
        let classifier = KeywordClassifier::new();
        let classification = classifier
            .classify("How do I integrate the API with Python?", None, &catalog())
            .await
            .unwrap();

        assert_eq!(
            classification.workflow_id.as_deref(),
            Some("technical-support")
        );
    }

    #[tokio::test]
    async fn test_unrelated_query_is_no_match() {
        let classifier = KeywordClassifier::new();
        let classification = classifier
            .classify("zzz qqq xyzzy", None, &catalog())
            .await
            .unwrap();

        assert!(classification.workflow_id.is_none());
    }

    #[tokio::test]
    async fn test_deterministic_across_calls() {
        let classifier = KeywordClassifier::new();
        let query = "what does the enterprise pricing look like?";

        let first = classifier.classify(query, None, &catalog()).await.unwrap();
        let second = classifier.classify(query, None, &catalog()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.workflow_id.as_deref(), Some("sales-inquiry"));
    }

    #[tokio::test]
    async fn test_tie_breaks_by_id_order() {
        let catalog = vec![
            summary("b-flow", "shared", "nothing here", &[]),
            summary("a-flow", "shared", "nothing here", &[]),
        ];

        let classifier = KeywordClassifier::new();
        let classification = classifier
            .classify("shared category query", None, &catalog)
            .await
            .unwrap();

        assert_eq!(classification.workflow_id.as_deref(), Some("a-flow"));
    }

    #[tokio::test]
    async fn test_context_contributes_tokens() {
        let classifier = KeywordClassifier::new();

        let mut context = HashMap::new();
        context.insert("topic".to_string(), "refund for my order".to_string());

        let classification = classifier
            .classify("please assist", Some(&context), &catalog())
            .await
            .unwrap();

        assert_eq!(
            classification.workflow_id.as_deref(),
            Some("customer-support")
        );
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        let tokens = KeywordClassifier::tokenize("I am an API of 42 chars");
        assert!(tokens.contains("api"));
        assert!(tokens.contains("chars"));
        assert!(!tokens.contains("am"));
        assert!(!tokens.contains("i"));
    }

    #[test]
    fn test_score_id_segments() {
        let workflow = summary("customer-support", "other", "nothing", &[]);
        let tokens = KeywordClassifier::tokenize("support please");
        assert!(KeywordClassifier::score(&tokens, &workflow) >= 2);
    }
}
