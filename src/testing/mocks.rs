//! Mock implementations for testing
//!
//! Provides mock LlmProvider and DocumentStore implementations to enable
//! comprehensive testing without external dependencies.

use crate::llm::provider::{
    ChunkStream, CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider,
    StreamChunk, TokenUsage,
};
use crate::registry::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock LLM provider for testing
///
/// Cycles through scripted responses and counts invocations so tests can
/// assert how often the backend was actually called.
pub struct MockLlmProvider {
    name: String,
    pub responses: Vec<String>,
    current_response: Arc<Mutex<usize>>,
    /// Chunk boundaries used by `complete_stream`; when empty, the next
    /// scripted response is emitted as a single chunk
    stream_chunks: Vec<String>,
    should_fail: bool,
    /// Fail only the stream mid-way, after emitting this many chunks
    fail_after_chunks: Option<usize>,
    /// Fail the first N backend invocations, then succeed
    fail_first: usize,
    attempts: Arc<AtomicUsize>,
    complete_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            current_response: Arc::new(Mutex::new(0)),
            stream_chunks: Vec::new(),
            should_fail: false,
            fail_after_chunks: None,
            fail_first: 0,
            attempts: Arc::new(AtomicUsize::new(0)),
            complete_calls: Arc::new(AtomicUsize::new(0)),
            stream_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock that reports a specific provider name (e.g., "openai")
    pub fn named(name: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new(responses)
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Mock whose streaming path yields the given chunks in order
    pub fn streaming(chunks: Vec<&str>) -> Self {
        let chunks: Vec<String> = chunks.into_iter().map(str::to_string).collect();
        Self {
            responses: vec![chunks.concat()],
            stream_chunks: chunks,
            ..Self::new(vec![])
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    /// Streaming mock that errors after emitting `count` chunks
    pub fn failing_mid_stream(chunks: Vec<&str>, count: usize) -> Self {
        let mut mock = Self::streaming(chunks);
        mock.fail_after_chunks = Some(count);
        mock
    }

    /// Mock that fails the first `n` invocations, then serves `response`
    pub fn failing_first(n: usize, response: impl Into<String>) -> Self {
        let mut mock = Self::single_response(response);
        mock.fail_first = n;
        mock
    }

    fn attempt_should_fail(&self) -> bool {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.should_fail || attempt < self.fail_first
    }

    /// Number of non-streaming completion calls made
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// Number of streaming completion calls made
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Total backend invocations across both paths
    pub fn total_calls(&self) -> usize {
        self.complete_calls() + self.stream_calls()
    }

    async fn next_response(&self) -> String {
        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[response_idx].clone()
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);

        if self.attempt_should_fail() {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let content = self.next_response().await;

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<ChunkStream, LlmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        if self.attempt_should_fail() {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let _ = request;
        let chunks = if self.stream_chunks.is_empty() {
            // Fall back to the scripted response as one chunk
            vec![self.next_response().await]
        } else {
            self.stream_chunks.clone()
        };

        let fail_after = self.fail_after_chunks;

        let stream = async_stream::stream! {
            for (i, chunk) in chunks.into_iter().enumerate() {
                if let Some(limit) = fail_after {
                    if i >= limit {
                        yield Err(LlmError::RequestFailed(
                            "Mock stream failure".to_string(),
                        ));
                        return;
                    }
                }
                yield Ok(StreamChunk::text(chunk));
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed("Mock LLM failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// In-memory document store for testing and local development
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Value>>,
    should_fail: bool,
    fetch_calls: AtomicUsize,
    fetch_all_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with documents (keyed by their "id")
    pub fn with_documents(documents: Vec<Value>) -> Self {
        let map = documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get("id")?.as_str()?.to_string();
                Some((id, doc))
            })
            .collect();

        Self {
            documents: Mutex::new(map),
            ..Self::default()
        }
    }

    /// Create a store whose every operation fails
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_all_count(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_all(&self) -> Result<Vec<Value>, StoreError> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(StoreError::ConnectionFailed(
                "Mock store failure".to_string(),
            ));
        }

        let documents = self.documents.lock().await;
        let mut all: Vec<Value> = documents.values().cloned().collect();
        // Stable ordering for deterministic tests
        all.sort_by_key(|doc| {
            doc.get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        });
        Ok(all)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Value>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(StoreError::ConnectionFailed(
                "Mock store failure".to_string(),
            ));
        }

        let documents = self.documents.lock().await;
        Ok(documents.get(id).cloned())
    }

    async fn upsert(&self, document: &Value) -> Result<(), StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(StoreError::ConnectionFailed(
                "Mock store failure".to_string(),
            ));
        }

        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidResponse("document missing 'id'".to_string()))?
            .to_string();

        let mut documents = self.documents.lock().await;
        documents.insert(id, document.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.should_fail {
            Err(StoreError::ConnectionFailed(
                "Mock store failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_provider_cycles_responses() {
        let provider = MockLlmProvider::new(vec!["one".to_string(), "two".to_string()]);

        let first = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        let second = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        let third = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();

        assert_eq!(first.content.as_deref(), Some("one"));
        assert_eq!(second.content.as_deref(), Some("two"));
        assert_eq!(third.content.as_deref(), Some("one"));
        assert_eq!(provider.complete_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_failure() {
        let provider = MockLlmProvider::with_failure();
        let result = provider.complete(CompletionRequest::default()).await;
        assert!(result.is_err());
        assert_eq!(provider.complete_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_streaming() {
        let provider = MockLlmProvider::streaming(vec!["a", "b", "c"]);
        let mut stream = provider
            .complete_stream(CompletionRequest::default())
            .await
            .unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.push(chunk.unwrap().delta);
        }

        assert_eq!(collected, vec!["a", "b", "c"]);
        assert_eq!(provider.stream_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_mid_stream_failure() {
        let provider = MockLlmProvider::failing_mid_stream(vec!["a", "b", "c"], 1);
        let mut stream = provider
            .complete_stream(CompletionRequest::default())
            .await
            .unwrap();

        let first = stream.next().await.unwrap();
        assert_eq!(first.unwrap().delta, "a");

        let second = stream.next().await.unwrap();
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryDocumentStore::new();
        let doc = serde_json::json!({ "id": "wf-1", "category": "test" });

        store.upsert(&doc).await.unwrap();

        let fetched = store.fetch("wf-1").await.unwrap();
        assert_eq!(fetched, Some(doc));
        assert_eq!(store.upsert_count(), 1);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_fetch_all_sorted() {
        let store = MemoryDocumentStore::with_documents(vec![
            serde_json::json!({ "id": "b" }),
            serde_json::json!({ "id": "a" }),
        ]);

        let all = store.fetch_all().await.unwrap();
        assert_eq!(all[0]["id"], "a");
        assert_eq!(all[1]["id"], "b");
    }

    #[tokio::test]
    async fn test_memory_store_failing() {
        let store = MemoryDocumentStore::failing();
        assert!(store.fetch_all().await.is_err());
        assert!(store.fetch("x").await.is_err());
        assert!(store.health_check().await.is_err());
    }
}
