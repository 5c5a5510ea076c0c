//! Workflow router
//!
//! Orchestrates classification, cache lookup, and streaming execution.
//! Each request is an independent async task; the registry loader and the
//! response cache are shared across concurrent requests. Concurrent
//! identical cache misses are collapsed to a single backend call via a
//! per-key in-flight lock; a failed or cancelled execution never writes
//! the cache.

use crate::cache::{CacheKey, CacheStats, CachedResponse, ResponseCache};
use crate::classifier::{Classification, Classifier, KeywordClassifier, LlmClassifier};
use crate::config::{ClassifierStrategy, RouterConfig};
use crate::error::{truncate_query, RouterError, RouterResult};
use crate::executor::WorkflowExecutor;
use crate::llm::provider::LlmProvider;
use crate::llm::providers::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider};
use crate::registry::{
    DocumentStore, HttpDocumentStore, RegistryCacheStats, StoreConfig, StoreError,
    WorkflowDefinition, WorkflowLoader, WorkflowSummary,
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How the routed workflow was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    /// The classifier picked the workflow
    Classified,
    /// Classification found nothing; the configured fallback was used
    Fallback,
    /// The caller named the workflow directly
    Direct,
}

/// Ephemeral record of one routing decision; never persisted
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoutingDecision {
    /// Truncated query text, safe for logs
    pub query_preview: String,
    /// Selected workflow id
    pub workflow_id: String,
    pub source: RouteSource,
    /// Classifier justification, when one was produced
    pub reasoning: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Request lifecycle phases
///
/// `Idle -> Classifying -> {CacheHit -> Emitting | Executing -> Emitting}
/// -> Done`, with `Failed` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    Idle,
    Classifying,
    CacheHit,
    Executing,
    Emitting,
    Done,
    Failed,
}

impl RoutePhase {
    /// Whether `next` is a legal successor of this phase
    pub fn can_transition_to(self, next: RoutePhase) -> bool {
        use RoutePhase::*;
        match (self, next) {
            (Idle, Classifying) => true,
            (Classifying, CacheHit) | (Classifying, Executing) => true,
            (CacheHit, Emitting) | (Executing, Emitting) => true,
            (Emitting, Done) => true,
            (Idle | Classifying | CacheHit | Executing | Emitting, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RoutePhase::Done | RoutePhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoutePhase::Idle => "idle",
            RoutePhase::Classifying => "classifying",
            RoutePhase::CacheHit => "cache_hit",
            RoutePhase::Executing => "executing",
            RoutePhase::Emitting => "emitting",
            RoutePhase::Done => "done",
            RoutePhase::Failed => "failed",
        }
    }
}

fn advance(request_id: Uuid, phase: &mut RoutePhase, next: RoutePhase) {
    debug_assert!(
        phase.can_transition_to(next),
        "illegal phase transition {} -> {}",
        phase.as_str(),
        next.as_str()
    );
    debug!(request_id = %request_id, phase = next.as_str(), "Route phase change");
    *phase = next;
}

/// Stream of response text chunks for one routed request
pub type ResponseStream = Pin<Box<dyn Stream<Item = RouterResult<String>> + Send>>;

/// Combined cache statistics for diagnostics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RouterStats {
    pub response_cache: Option<CacheStats>,
    pub registry_cache: RegistryCacheStats,
}

type InflightMap = Arc<StdMutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>;

/// Removes the in-flight entry once the last participant is done
struct InflightGuard {
    map: InflightMap,
    key: CacheKey,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        // Two strong refs remain when nobody else waits: the map's and ours
        if Arc::strong_count(&self.lock) <= 2 {
            map.remove(&self.key);
        }
    }
}

/// Dynamic workflow router
///
/// Owns its components explicitly; construct via [`WorkflowRouter::new`]
/// with prebuilt parts, or [`WorkflowRouter::from_config`] to assemble
/// them from a [`RouterConfig`]. Call [`WorkflowRouter::cleanup`] on
/// shutdown.
pub struct WorkflowRouter {
    loader: Arc<WorkflowLoader>,
    classifier: Arc<dyn Classifier>,
    executor: Arc<WorkflowExecutor>,
    cache: Option<ResponseCache>,
    fallback_workflow: Option<String>,
    inflight: InflightMap,
}

impl WorkflowRouter {
    /// Create a router from prebuilt components
    pub fn new(
        loader: Arc<WorkflowLoader>,
        classifier: Arc<dyn Classifier>,
        executor: Arc<WorkflowExecutor>,
        cache: Option<ResponseCache>,
        fallback_workflow: Option<String>,
    ) -> Self {
        Self {
            loader,
            classifier,
            executor,
            cache,
            fallback_workflow,
            inflight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Assemble a router from configuration
    ///
    /// Builds the store client, loader, provider, classifier, executor,
    /// and cache. Secrets are resolved from the environment here and
    /// handed to the components; they are never logged.
    pub fn from_config(config: &RouterConfig) -> RouterResult<Self> {
        config.validate()?;

        let api_key = config.get_llm_api_key()?;
        let provider: Arc<dyn LlmProvider> = match config.llm.provider.as_str() {
            "openai" => {
                let mut provider_config = OpenAiConfig {
                    api_key,
                    ..Default::default()
                };
                if let Some(ref base_url) = config.llm.base_url {
                    provider_config.base_url = base_url.clone();
                }
                Arc::new(OpenAiProvider::new(provider_config)?)
            }
            "anthropic" => {
                let mut provider_config = AnthropicConfig {
                    api_key,
                    ..Default::default()
                };
                if let Some(ref base_url) = config.llm.base_url {
                    provider_config.base_url = base_url.clone();
                }
                Arc::new(AnthropicProvider::new(provider_config)?)
            }
            other => {
                return Err(RouterError::invalid_input(format!(
                    "Unknown LLM provider '{other}'"
                )))
            }
        };

        let store_config = StoreConfig {
            endpoint: config.registry.endpoint.clone(),
            api_key: config.get_registry_api_key(),
            database: config.registry.database.clone(),
            container: config.registry.container.clone(),
            timeout: Duration::from_millis(config.registry.timeout_ms),
            retry_attempts: config.registry.retry_attempts,
        };
        let store: Arc<dyn DocumentStore> = Arc::new(HttpDocumentStore::new(store_config)?);

        let loader = Arc::new(WorkflowLoader::new(
            store,
            Duration::from_secs(config.registry.cache_ttl_secs),
        ));

        let classifier: Arc<dyn Classifier> = match config.classifier.strategy {
            ClassifierStrategy::Llm => {
                let llm_config = config
                    .classifier
                    .llm
                    .as_ref()
                    .expect("validated: llm strategy has llm config");
                Arc::new(
                    LlmClassifier::new(provider.clone(), llm_config.model.clone())
                        .with_temperature(llm_config.temperature),
                )
            }
            ClassifierStrategy::Keyword => Arc::new(KeywordClassifier::new()),
        };

        let mut executor = WorkflowExecutor::new(provider, config.llm.model.clone());
        if let Some(max_tokens) = config.llm.max_tokens {
            executor = executor.with_max_tokens(max_tokens);
        }

        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::with_ttl(Duration::from_secs(config.cache.ttl_secs)));

        Ok(Self::new(
            loader,
            classifier,
            Arc::new(executor),
            cache,
            config.router.fallback_workflow.clone(),
        ))
    }

    fn registry_error(e: StoreError) -> RouterError {
        RouterError::registry_unavailable(e.to_string())
    }

    /// Classify a query and resolve the workflow that will handle it
    ///
    /// Falls back to the configured fallback workflow when classification
    /// finds no match or the classified workflow is missing/disabled.
    pub async fn classify(&self, query: &str) -> RouterResult<RoutingDecision> {
        let (decision, _definition) = self.resolve(query, None).await?;
        Ok(decision)
    }

    async fn resolve(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
    ) -> RouterResult<(RoutingDecision, WorkflowDefinition)> {
        let catalog = self
            .loader
            .list_workflows(None)
            .await
            .map_err(Self::registry_error)?;

        let classification = self.classifier.classify(query, context, &catalog).await?;

        let (definition, source) = self.lookup_with_fallback(&classification).await?;

        let decision = RoutingDecision {
            query_preview: truncate_query(query, 100),
            workflow_id: definition.id.clone(),
            source,
            reasoning: classification.reasoning,
            decided_at: Utc::now(),
        };

        Ok((decision, definition))
    }

    async fn lookup_with_fallback(
        &self,
        classification: &Classification,
    ) -> RouterResult<(WorkflowDefinition, RouteSource)> {
        if let Some(ref workflow_id) = classification.workflow_id {
            match self
                .loader
                .get_workflow(workflow_id)
                .await
                .map_err(Self::registry_error)?
            {
                Some(definition) => return Ok((definition, RouteSource::Classified)),
                None => {
                    warn!(
                        workflow_id = %workflow_id,
                        "Classified workflow is missing or disabled, using fallback"
                    );
                }
            }
        }

        let Some(ref fallback_id) = self.fallback_workflow else {
            return Err(RouterError::classification_failed(
                "No workflow matched the request and no fallback workflow is configured",
            ));
        };

        match self
            .loader
            .get_workflow(fallback_id)
            .await
            .map_err(Self::registry_error)?
        {
            Some(definition) => Ok((definition, RouteSource::Fallback)),
            None => Err(RouterError::classification_failed(format!(
                "No workflow matched and fallback workflow '{fallback_id}' is unavailable"
            ))),
        }
    }

    /// Classify a query, then execute the selected workflow
    ///
    /// Returns a stream of response chunks. On a cache hit the cached
    /// response replays as a single chunk without touching the backend.
    pub async fn route_and_execute(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
        stream: bool,
    ) -> RouterResult<ResponseStream> {
        let request_id = Uuid::new_v4();
        let mut phase = RoutePhase::Idle;

        info!(
            request_id = %request_id,
            query = %truncate_query(query, 100),
            "Routing request"
        );

        advance(request_id, &mut phase, RoutePhase::Classifying);
        let (decision, definition) = match self.resolve(query, context).await {
            Ok(resolved) => resolved,
            Err(e) => {
                advance(request_id, &mut phase, RoutePhase::Failed);
                return Err(e);
            }
        };

        info!(
            request_id = %request_id,
            workflow_id = %decision.workflow_id,
            source = ?decision.source,
            "Workflow selected"
        );

        self.execute_resolved(request_id, phase, decision, definition, query, context, stream)
            .await
    }

    /// Execute a specific workflow directly, bypassing classification
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        query: &str,
        context: Option<&HashMap<String, String>>,
        stream: bool,
    ) -> RouterResult<ResponseStream> {
        let request_id = Uuid::new_v4();
        let mut phase = RoutePhase::Idle;
        advance(request_id, &mut phase, RoutePhase::Classifying);

        let definition = self
            .loader
            .get_workflow(workflow_id)
            .await
            .map_err(Self::registry_error)?
            .ok_or_else(|| RouterError::workflow_not_found(workflow_id))?;

        let decision = RoutingDecision {
            query_preview: truncate_query(query, 100),
            workflow_id: definition.id.clone(),
            source: RouteSource::Direct,
            reasoning: None,
            decided_at: Utc::now(),
        };

        self.execute_resolved(request_id, phase, decision, definition, query, context, stream)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_resolved(
        &self,
        request_id: Uuid,
        mut phase: RoutePhase,
        decision: RoutingDecision,
        definition: WorkflowDefinition,
        query: &str,
        context: Option<&HashMap<String, String>>,
        stream: bool,
    ) -> RouterResult<ResponseStream> {
        let Some(cache) = self.cache.clone() else {
            // Caching disabled: plain pass-through execution
            advance(request_id, &mut phase, RoutePhase::Executing);
            let chunks = self
                .executor
                .execute(&definition, query, context, stream)
                .await?;
            let workflow_id = definition.id.clone();
            return Ok(Box::pin(chunks.map(move |chunk| {
                chunk
                    .map(|c| c.delta)
                    .map_err(|e| RouterError::execution_failed(&workflow_id, e.to_string()))
            })));
        };

        let key = CacheKey::new(&definition.id, query);

        if let Some(cached) = cache.get(&key).await {
            advance(request_id, &mut phase, RoutePhase::CacheHit);
            info!(
                request_id = %request_id,
                workflow_id = %decision.workflow_id,
                key_fingerprint = key.fingerprint(),
                "Response cache hit"
            );
            advance(request_id, &mut phase, RoutePhase::Emitting);
            advance(request_id, &mut phase, RoutePhase::Done);
            return Ok(Box::pin(futures::stream::once(async move {
                Ok(cached.text)
            })));
        }

        let lock = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            inflight.entry(key.clone()).or_default().clone()
        };
        let guard = InflightGuard {
            map: self.inflight.clone(),
            key: key.clone(),
            lock,
        };

        let executor = self.executor.clone();
        let query = query.to_string();
        let context = context.cloned();
        let workflow_id = definition.id.clone();

        let response_stream = async_stream::stream! {
            // Single-flight: only one execution per key at a time. Waiters
            // re-check the cache once the leader releases the lock. The
            // guard lives until the generator is dropped, cancellation
            // included, so the in-flight entry is always reclaimed.
            let _guard = guard;
            let lock = _guard.lock.clone();
            let _permit = lock.lock().await;

            if let Some(cached) = cache.get(&key).await {
                debug!(
                    request_id = %request_id,
                    workflow_id = %workflow_id,
                    "Response cached by concurrent request, replaying"
                );
                yield Ok(cached.text);
                return;
            }

            advance(request_id, &mut phase, RoutePhase::Executing);

            let mut chunks = match executor
                .execute(&definition, &query, context.as_ref(), stream)
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    advance(request_id, &mut phase, RoutePhase::Failed);
                    warn!(
                        request_id = %request_id,
                        workflow_id = %workflow_id,
                        error = %e.user_message(),
                        "Workflow execution failed to start"
                    );
                    yield Err(e);
                    return;
                }
            };

            advance(request_id, &mut phase, RoutePhase::Emitting);

            let mut accumulated = String::new();
            let mut chunk_count = 0usize;

            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        if chunk.delta.is_empty() {
                            continue;
                        }
                        accumulated.push_str(&chunk.delta);
                        chunk_count += 1;
                        yield Ok(chunk.delta);
                    }
                    Err(e) => {
                        // A failed execution must never populate the cache
                        advance(request_id, &mut phase, RoutePhase::Failed);
                        warn!(
                            request_id = %request_id,
                            workflow_id = %workflow_id,
                            error = %e,
                            "Workflow execution failed mid-stream"
                        );
                        yield Err(RouterError::execution_failed(&workflow_id, e.to_string()));
                        return;
                    }
                }
            }

            cache
                .put(key.clone(), CachedResponse {
                    text: accumulated,
                    chunk_count,
                })
                .await;

            advance(request_id, &mut phase, RoutePhase::Done);
            debug!(
                request_id = %request_id,
                workflow_id = %workflow_id,
                chunk_count,
                "Response cached"
            );
        };

        Ok(Box::pin(response_stream))
    }

    /// Route a query and collect the full response text
    pub async fn route_and_collect(
        &self,
        query: &str,
        context: Option<&HashMap<String, String>>,
    ) -> RouterResult<String> {
        let mut chunks = self.route_and_execute(query, context, false).await?;
        let mut text = String::new();
        while let Some(chunk) = chunks.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }

    /// List enabled workflows
    pub async fn list_workflows(&self) -> RouterResult<Vec<WorkflowSummary>> {
        self.loader
            .list_workflows(None)
            .await
            .map_err(Self::registry_error)
    }

    /// Get the full definition of an enabled workflow
    pub async fn workflow_info(&self, workflow_id: &str) -> RouterResult<Option<WorkflowDefinition>> {
        self.loader
            .get_workflow(workflow_id)
            .await
            .map_err(Self::registry_error)
    }

    /// Force the next registry read to refetch from the store
    pub async fn reload_workflows(&self) {
        self.loader.reload().await;
        info!("Workflow registry caches cleared");
    }

    /// Cache statistics for diagnostics
    pub async fn stats(&self) -> RouterStats {
        let response_cache = match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        };

        RouterStats {
            response_cache,
            registry_cache: self.loader.cache_stats().await,
        }
    }

    /// Release held resources
    ///
    /// Clears response and registry caches and drops any in-flight
    /// bookkeeping. Idempotent; safe to call on error paths.
    pub async fn cleanup(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear().await;
        }
        self.loader.reload().await;

        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight.clear();
        drop(inflight);

        info!("Router cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use RoutePhase::*;

        assert!(Idle.can_transition_to(Classifying));
        assert!(Classifying.can_transition_to(CacheHit));
        assert!(Classifying.can_transition_to(Executing));
        assert!(CacheHit.can_transition_to(Emitting));
        assert!(Executing.can_transition_to(Emitting));
        assert!(Emitting.can_transition_to(Done));

        assert!(Classifying.can_transition_to(Failed));
        assert!(Executing.can_transition_to(Failed));
        assert!(Emitting.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Executing));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Classifying));
        assert!(!CacheHit.can_transition_to(Done));
    }

    #[test]
    fn test_phase_terminality() {
        assert!(RoutePhase::Done.is_terminal());
        assert!(RoutePhase::Failed.is_terminal());
        assert!(!RoutePhase::Emitting.is_terminal());
    }

    #[test]
    fn test_from_config_builds_router() {
        let mut config = RouterConfig::test_config();
        config.llm.api_key_env = "FLOWROUTE_FROM_CONFIG_TEST_KEY".to_string();
        std::env::set_var("FLOWROUTE_FROM_CONFIG_TEST_KEY", "test-key");

        let router = WorkflowRouter::from_config(&config);
        assert!(router.is_ok());
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let mut config = RouterConfig::test_config();
        config.llm.provider = "mystery".to_string();
        config.llm.api_key_env = "FLOWROUTE_UNKNOWN_PROVIDER_TEST_KEY".to_string();
        std::env::set_var("FLOWROUTE_UNKNOWN_PROVIDER_TEST_KEY", "test-key");

        let result = WorkflowRouter::from_config(&config);
        assert!(matches!(result, Err(RouterError::InvalidInput { .. })));
    }

    #[test]
    fn test_route_source_serialization() {
        assert_eq!(
            serde_json::to_string(&RouteSource::Classified).unwrap(),
            "\"classified\""
        );
        assert_eq!(
            serde_json::to_string(&RouteSource::Fallback).unwrap(),
            "\"fallback\""
        );
    }
}
