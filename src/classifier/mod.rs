//! Intent classification
//!
//! Maps free-text queries to workflow identifiers drawn from the set of
//! enabled workflow definitions. Two strategies: an LLM-backed classifier
//! and a deterministic keyword matcher.

pub mod keyword;
pub mod llm;

pub use keyword::KeywordClassifier;
pub use llm::LlmClassifier;

use crate::error::RouterResult;
use crate::registry::WorkflowSummary;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel the classifier emits when no workflow matches
pub const NO_MATCH: &str = "no_match";

/// Result of classifying a query
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Selected workflow id; `None` when nothing matched
    pub workflow_id: Option<String>,
    /// Optional justification for observability
    pub reasoning: Option<String>,
}

impl Classification {
    pub fn matched(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: Some(workflow_id.into()),
            reasoning: None,
        }
    }

    pub fn no_match() -> Self {
        Self {
            workflow_id: None,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Structured output schema for LLM classification
///
/// Used with OpenAI's JSON Schema `response_format`; providers without
/// structured output fall back to a bare-id text protocol.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationOutput {
    /// Selected workflow id, or "no_match"
    pub workflow_id: String,

    /// Reasoning for the classification (for observability and debugging)
    pub reasoning: String,
}

impl ClassificationOutput {
    /// Generate the JSON schema for this structure
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(ClassificationOutput);
        serde_json::to_value(schema).expect("Schema should be serializable")
    }
}

/// Classifier trait for mapping queries to workflow identifiers
///
/// Implementations must only ever return ids present in the supplied
/// catalog; anything else is reported as no-match so the router can
/// apply its fallback.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classifier name for logs (e.g., "llm", "keyword")
    fn name(&self) -> &str;

    /// Classify a query against the enabled workflow catalog
    async fn classify(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
        catalog: &[WorkflowSummary],
    ) -> RouterResult<Classification>;
}

/// Merge optional context lines into the query text
///
/// Context keys are sorted so identical inputs produce identical prompts.
pub(crate) fn merge_context(query: &str, context: Option<&HashMap<String, String>>) -> String {
    match context {
        Some(context) if !context.is_empty() => {
            let mut pairs: Vec<_> = context.iter().collect();
            pairs.sort_by_key(|(k, _)| k.as_str());

            let context_str = pairs
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n");

            format!("User input: {query}\n\nContext:\n{context_str}")
        }
        _ => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_constructors() {
        let matched = Classification::matched("customer-support");
        assert_eq!(matched.workflow_id.as_deref(), Some("customer-support"));
        assert!(matched.reasoning.is_none());

        let no_match = Classification::no_match().with_reasoning("nothing fits");
        assert!(no_match.workflow_id.is_none());
        assert_eq!(no_match.reasoning.as_deref(), Some("nothing fits"));
    }

    #[test]
    fn test_schema_generation() {
        let schema = ClassificationOutput::json_schema();

        assert!(schema.is_object());
        assert!(schema["properties"]["workflow_id"].is_object());
        assert!(schema["properties"]["reasoning"].is_object());
    }

    #[test]
    fn test_merge_context_without_context() {
        assert_eq!(merge_context("hello", None), "hello");

        let empty = HashMap::new();
        assert_eq!(merge_context("hello", Some(&empty)), "hello");
    }

    #[test]
    fn test_merge_context_is_deterministic() {
        let mut context = HashMap::new();
        context.insert("user_tier".to_string(), "premium".to_string());
        context.insert("locale".to_string(), "en-US".to_string());

        let merged = merge_context("help me", Some(&context));
        assert!(merged.starts_with("User input: help me"));

        // Sorted keys: locale before user_tier
        let locale_pos = merged.find("locale").unwrap();
        let tier_pos = merged.find("user_tier").unwrap();
        assert!(locale_pos < tier_pos);

        assert_eq!(merged, merge_context("help me", Some(&context)));
    }
}
