//! Flowroute - Dynamic Workflow Router
//!
//! Routes free-text user requests to workflow definitions held in an
//! external document store, with LLM or keyword intent classification,
//! TTL-bounded response caching, and streaming execution.
//!
//! # Overview
//!
//! This crate provides:
//! - A typed workflow registry over a document store, cached with TTL
//! - Intent classification (LLM-backed or deterministic keyword matching)
//! - A response cache with single-flight de-duplication of identical
//!   concurrent misses
//! - A streaming router that accumulates chunks for cache insertion and
//!   never caches failed or cancelled executions
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flowroute::classifier::KeywordClassifier;
//! use flowroute::cache::ResponseCache;
//! use flowroute::executor::WorkflowExecutor;
//! use flowroute::registry::WorkflowLoader;
//! use flowroute::router::WorkflowRouter;
//! use flowroute::testing::mocks::{MemoryDocumentStore, MockLlmProvider};
//! use futures::StreamExt;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryDocumentStore::with_documents(vec![serde_json::json!({
//!     "id": "customer-support",
//!     "category": "support",
//!     "description": "Handles order issues",
//!     "agent_config": { "instructions": "You are a support agent." }
//! })]));
//!
//! let router = WorkflowRouter::new(
//!     Arc::new(WorkflowLoader::new(store, Duration::from_secs(300))),
//!     Arc::new(KeywordClassifier::new()),
//!     Arc::new(WorkflowExecutor::new(
//!         Arc::new(MockLlmProvider::single_response("Happy to help!")),
//!         "mock-model".to_string(),
//!     )),
//!     Some(ResponseCache::new()),
//!     None,
//! );
//!
//! let mut chunks = router
//!     .route_and_execute("I need help with my order #12345", None, true)
//!     .await?;
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}", chunk?);
//! }
//!
//! router.cleanup().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod observability;
pub mod registry;
pub mod router;
pub mod testing;

pub use cache::{CacheKey, CacheStats, CachedResponse, ResponseCache};
pub use classifier::{Classification, Classifier, KeywordClassifier, LlmClassifier};
pub use config::{ConfigError, RouterConfig};
pub use error::{RouterError, RouterResult};
pub use executor::WorkflowExecutor;
pub use registry::{
    DocumentStore, HttpDocumentStore, WorkflowDefinition, WorkflowKind, WorkflowLoader,
    WorkflowSummary,
};
pub use router::{ResponseStream, RouteSource, RoutingDecision, WorkflowRouter};
