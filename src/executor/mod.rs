//! Workflow execution
//!
//! Turns a workflow definition plus user query into a chunk stream from
//! the execution backend. Stateless per call; the router owns caching
//! and fallback policy.

use crate::classifier::merge_context;
use crate::error::{RouterError, RouterResult};
use crate::llm::provider::{
    ChunkStream, CompletionRequest, LlmProvider, Message, MessageRole, StreamChunk,
};
use crate::registry::WorkflowDefinition;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Executes workflow definitions against an LLM backend
pub struct WorkflowExecutor {
    provider: Arc<dyn LlmProvider>,
    /// Model used when the workflow definition does not name one
    default_model: String,
    /// Optional completion budget applied to every execution
    max_tokens: Option<u32>,
}

impl WorkflowExecutor {
    /// Create a new executor
    pub fn new(provider: Arc<dyn LlmProvider>, default_model: String) -> Self {
        Self {
            provider,
            default_model,
            max_tokens: None,
        }
    }

    /// Apply a completion token budget to all executions
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Build the completion request for a workflow execution (pure function)
    fn build_request(
        &self,
        workflow: &WorkflowDefinition,
        query: &str,
        context: Option<&HashMap<String, String>>,
    ) -> CompletionRequest {
        let model = workflow
            .agent_config
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        CompletionRequest {
            model,
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: workflow.agent_config.instructions.clone(),
                },
                Message {
                    role: MessageRole::User,
                    content: merge_context(query, context),
                },
            ],
            temperature: workflow.agent_config.temperature,
            top_p: workflow.agent_config.top_p,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }

    /// Execute a workflow, yielding response chunks in generation order
    ///
    /// With `stream = false` the backend is called non-streaming and the
    /// whole response arrives as one chunk. Workflow kinds that cannot
    /// stream are downgraded to the non-streaming path regardless of the
    /// flag.
    pub async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        query: &str,
        context: Option<&HashMap<String, String>>,
        stream: bool,
    ) -> RouterResult<ChunkStream> {
        let request = self.build_request(workflow, query, context);

        debug!(
            workflow_id = %workflow.id,
            model = %request.model,
            kind = workflow.kind.as_str(),
            stream,
            "Executing workflow"
        );

        let workflow_id = workflow.id.clone();

        if stream && workflow.kind.supports_streaming() {
            self.provider
                .complete_stream(request)
                .await
                .map_err(|e| RouterError::execution_failed(&workflow_id, e.to_string()))
        } else {
            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| RouterError::execution_failed(&workflow_id, e.to_string()))?;

            let content = response.content.unwrap_or_default();
            let usage = response.usage;

            Ok(Box::pin(futures::stream::once(async move {
                Ok(StreamChunk {
                    delta: content,
                    usage: Some(usage),
                })
            })))
        }
    }

    /// Execute and collect the full response text
    pub async fn execute_collect(
        &self,
        workflow: &WorkflowDefinition,
        query: &str,
        context: Option<&HashMap<String, String>>,
    ) -> RouterResult<String> {
        let mut chunks = self.execute(workflow, query, context, false).await?;
        let mut text = String::new();

        while let Some(chunk) = chunks.next().await {
            let chunk =
                chunk.map_err(|e| RouterError::execution_failed(&workflow.id, e.to_string()))?;
            text.push_str(&chunk.delta);
        }

        Ok(text)
    }
}
