//! LLM-based intent classification
//!
//! Uses a chat completion constrained to the set of enabled workflow ids.
//! OpenAI gets a strict JSON Schema response format; other providers use
//! a bare-id text protocol with the "no_match" sentinel.

use crate::classifier::{
    merge_context, Classification, ClassificationOutput, Classifier, NO_MATCH,
};
use crate::error::{truncate_query, RouterError, RouterResult};
use crate::llm::provider::{
    CompletionRequest, JsonSchemaDefinition, LlmProvider, Message, MessageRole, ResponseFormat,
};
use crate::registry::WorkflowSummary;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// LLM-backed classifier
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
    /// Model used for classification calls
    model: String,
    /// Temperature for classification (low for deterministic routing)
    temperature: f32,
}

impl LlmClassifier {
    /// Create a new LLM classifier
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self {
            provider,
            model,
            temperature: 0.3,
        }
    }

    /// Override the classification temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn is_openai_provider(&self) -> bool {
        self.provider.name() == "openai"
    }

    /// Format the workflow catalog for the classification prompt
    fn format_catalog(catalog: &[WorkflowSummary]) -> String {
        catalog
            .iter()
            .map(|wf| {
                format!(
                    "- {}: {}",
                    wf.id,
                    wf.description.as_deref().unwrap_or("No description")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the classification instructions
    fn build_instructions(catalog: &[WorkflowSummary]) -> String {
        let workflow_catalog = Self::format_catalog(catalog);

        format!(
            r#"You are an intelligent workflow router. Your job is to analyze user input and determine which workflow should handle the request.

Available workflows:
{workflow_catalog}

Instructions:
1. Carefully analyze the user's input to understand their intent
2. Match the intent to the most appropriate workflow
3. Return ONLY the workflow ID (e.g., "customer-support")
4. If no workflow matches, return "{NO_MATCH}"
5. Be concise - return only the workflow ID

Examples:
User: "I need help with my order"
You: customer-support

User: "How do I integrate the API?"
You: technical-support

User: "I want to buy your product"
You: sales-inquiry"#
        )
    }

    /// Build the completion request with provider-specific structured output
    fn build_completion_request(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
        catalog: &[WorkflowSummary],
    ) -> CompletionRequest {
        let mut request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: Self::build_instructions(catalog),
                },
                Message {
                    role: MessageRole::User,
                    content: merge_context(query, context),
                },
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(200),
            ..Default::default()
        };

        if self.is_openai_provider() {
            request.response_format = Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaDefinition {
                    name: "workflow_classification".to_string(),
                    strict: Some(true),
                    schema: ClassificationOutput::json_schema(),
                },
            });
        }

        request
    }

    /// Parse the model output into a classification (pure function)
    ///
    /// Accepts either the structured JSON shape or a bare workflow id.
    /// Ids not present in the catalog collapse to no-match.
    fn parse_response(content: &str, catalog: &[WorkflowSummary]) -> Classification {
        let (candidate, reasoning) =
            match serde_json::from_str::<ClassificationOutput>(content.trim()) {
                Ok(output) => (output.workflow_id, Some(output.reasoning)),
                Err(_) => (content.trim().trim_matches('"').to_string(), None),
            };

        if candidate == NO_MATCH || candidate.is_empty() {
            let mut classification = Classification::no_match();
            classification.reasoning = reasoning;
            return classification;
        }

        if catalog.iter().any(|wf| wf.id == candidate) {
            Classification {
                workflow_id: Some(candidate),
                reasoning,
            }
        } else {
            warn!(
                candidate = %candidate,
                "Classifier returned an id outside the catalog, treating as no match"
            );
            let mut classification = Classification::no_match();
            classification.reasoning = reasoning;
            classification
        }
    }
}

#[async_trait::async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
        catalog: &[WorkflowSummary],
    ) -> RouterResult<Classification> {
        if catalog.is_empty() {
            return Ok(Classification::no_match());
        }

        debug!(
            query = %truncate_query(query, 100),
            catalog_size = catalog.len(),
            "Classifying query"
        );

        let request = self.build_completion_request(query, context, catalog);

        let response =
            self.provider
                .complete(request)
                .await
                .map_err(|e| RouterError::ClassificationFailed {
                    message: e.to_string(),
                })?;

        let content = response
            .content
            .ok_or_else(|| RouterError::classification_failed("No content in LLM response"))?;

        let classification = Self::parse_response(&content, catalog);

        info!(
            workflow_id = classification.workflow_id.as_deref().unwrap_or(NO_MATCH),
            "Classification complete"
        );

        Ok(classification)
    }
}
