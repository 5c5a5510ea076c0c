//! Shared builders for integration tests
#![allow(dead_code)]

use flowroute::cache::ResponseCache;
use flowroute::classifier::KeywordClassifier;
use flowroute::executor::WorkflowExecutor;
use flowroute::registry::WorkflowLoader;
use flowroute::router::WorkflowRouter;
use flowroute::testing::mocks::{MemoryDocumentStore, MockLlmProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub fn workflow_doc(id: &str, category: &str, description: &str, enabled: bool) -> Value {
    json!({
        "id": id,
        "name": id,
        "category": category,
        "description": description,
        "agent_config": {
            "instructions": format!("You are the {id} workflow agent."),
            "temperature": 0.7
        },
        "metadata": { "enabled": enabled, "version": "1.0" }
    })
}

pub fn default_documents() -> Vec<Value> {
    vec![
        workflow_doc(
            "customer-support",
            "support",
            "Handles order issues, returns and customer assistance",
            true,
        ),
        workflow_doc(
            "sales-inquiry",
            "sales",
            "Handles pricing, plans and purchase questions",
            true,
        ),
        workflow_doc(
            "general-assistant",
            "general",
            "General purpose assistant for anything else",
            true,
        ),
    ]
}

pub struct TestRig {
    pub router: WorkflowRouter,
    pub provider: Arc<MockLlmProvider>,
    pub store: Arc<MemoryDocumentStore>,
}

pub fn build_router(
    documents: Vec<Value>,
    provider: MockLlmProvider,
    cache_ttl: Option<Duration>,
    fallback: Option<&str>,
) -> TestRig {
    let store = Arc::new(MemoryDocumentStore::with_documents(documents));
    let provider = Arc::new(provider);

    let loader = Arc::new(WorkflowLoader::new(
        store.clone(),
        Duration::from_secs(300),
    ));
    let executor = Arc::new(WorkflowExecutor::new(
        provider.clone(),
        "mock-model".to_string(),
    ));

    let router = WorkflowRouter::new(
        loader,
        Arc::new(KeywordClassifier::new()),
        executor,
        cache_ttl.map(ResponseCache::with_ttl),
        fallback.map(str::to_string),
    );

    TestRig {
        router,
        provider,
        store,
    }
}
