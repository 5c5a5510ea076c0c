//! Fallback and error-path behavior of the router

use flowroute::error::RouterError;
use flowroute::router::RouteSource;
use flowroute::testing::mocks::MockLlmProvider;

mod test_helpers;
use test_helpers::{build_router, default_documents, workflow_doc};

#[tokio::test]
async fn test_no_match_falls_back_to_default_workflow() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("fallback output"),
        None,
        Some("general-assistant"),
    );

    // Nothing in the catalog matches these tokens
    let decision = rig.router.classify("xyzzy frobnicate quux").await.unwrap();
    assert_eq!(decision.workflow_id, "general-assistant");
    assert_eq!(decision.source, RouteSource::Fallback);

    let output = rig
        .router
        .route_and_collect("xyzzy frobnicate quux", None)
        .await
        .unwrap();
    assert!(!output.is_empty());
}

#[tokio::test]
async fn test_disabled_workflow_falls_back() {
    let mut documents = default_documents();
    documents.push(workflow_doc(
        "billing-disputes",
        "billing",
        "Handles billing disputes and invoice problems",
        false,
    ));

    let rig = build_router(
        documents,
        MockLlmProvider::single_response("fallback output"),
        None,
        Some("general-assistant"),
    );

    // The disabled workflow is invisible to the catalog, so the query
    // lands on the fallback and still produces non-empty output
    let output = rig
        .router
        .route_and_collect("dispute my billing invoice", None)
        .await
        .unwrap();
    assert_eq!(output, "fallback output");

    let decision = rig
        .router
        .classify("dispute my billing invoice")
        .await
        .unwrap();
    assert_eq!(decision.workflow_id, "general-assistant");
    assert_eq!(decision.source, RouteSource::Fallback);
}

#[tokio::test]
async fn test_classifier_pointing_at_disabled_workflow_falls_back() {
    use flowroute::cache::ResponseCache;
    use flowroute::classifier::{Classification, Classifier};
    use flowroute::error::RouterResult;
    use flowroute::executor::WorkflowExecutor;
    use flowroute::registry::{WorkflowLoader, WorkflowSummary};
    use flowroute::router::WorkflowRouter;
    use flowroute::testing::mocks::MemoryDocumentStore;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    // Always answers with an id the registry will refuse to serve
    struct StubbornClassifier;

    #[async_trait::async_trait]
    impl Classifier for StubbornClassifier {
        fn name(&self) -> &str {
            "stubborn"
        }

        async fn classify(
            &self,
            _query: &str,
            _context: Option<&HashMap<String, String>>,
            _catalog: &[WorkflowSummary],
        ) -> RouterResult<Classification> {
            Ok(Classification::matched("billing-disputes"))
        }
    }

    let mut documents = default_documents();
    documents.push(workflow_doc(
        "billing-disputes",
        "billing",
        "Handles billing disputes",
        false,
    ));

    let provider = Arc::new(MockLlmProvider::single_response("fallback output"));
    let router = WorkflowRouter::new(
        Arc::new(WorkflowLoader::new(
            Arc::new(MemoryDocumentStore::with_documents(documents)),
            Duration::from_secs(300),
        )),
        Arc::new(StubbornClassifier),
        Arc::new(WorkflowExecutor::new(provider, "mock-model".to_string())),
        Some(ResponseCache::new()),
        Some("general-assistant".to_string()),
    );

    let decision = router.classify("dispute my invoice").await.unwrap();
    assert_eq!(decision.workflow_id, "general-assistant");
    assert_eq!(decision.source, RouteSource::Fallback);

    let output = router
        .route_and_collect("dispute my invoice", None)
        .await
        .unwrap();
    assert_eq!(output, "fallback output");
}

#[tokio::test]
async fn test_no_match_without_fallback_fails() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("unused"),
        None,
        None,
    );

    let result = rig.router.route_and_execute("xyzzy frobnicate", None, true).await;
    assert!(matches!(
        result,
        Err(RouterError::ClassificationFailed { .. })
    ));
    assert_eq!(rig.provider.total_calls(), 0);
}

#[tokio::test]
async fn test_missing_fallback_workflow_fails() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("unused"),
        None,
        Some("does-not-exist"),
    );

    let result = rig.router.route_and_collect("xyzzy frobnicate", None).await;
    assert!(matches!(
        result,
        Err(RouterError::ClassificationFailed { .. })
    ));
}

#[tokio::test]
async fn test_classified_route_source() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("support output"),
        None,
        Some("general-assistant"),
    );

    let decision = rig
        .router
        .classify("I need help with my order #12345")
        .await
        .unwrap();

    assert_eq!(decision.workflow_id, "customer-support");
    assert_eq!(decision.source, RouteSource::Classified);
    assert!(decision.query_preview.contains("order"));
}

#[tokio::test]
async fn test_direct_execution_bypasses_classification() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("direct output"),
        None,
        None,
    );

    let output = {
        use futures::StreamExt;
        let mut chunks = rig
            .router
            .execute_workflow("sales-inquiry", "anything at all", None, false)
            .await
            .unwrap();

        let mut text = String::new();
        while let Some(chunk) = chunks.next().await {
            text.push_str(&chunk.unwrap());
        }
        text
    };

    assert_eq!(output, "direct output");
}

#[tokio::test]
async fn test_direct_execution_unknown_workflow() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("unused"),
        None,
        None,
    );

    let result = rig
        .router
        .execute_workflow("missing-workflow", "query", None, false)
        .await;

    match result {
        Err(RouterError::WorkflowNotFound { workflow_id }) => {
            assert_eq!(workflow_id, "missing-workflow");
        }
        other => panic!("Expected WorkflowNotFound, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_registry_outage_surfaces_as_unavailable() {
    use flowroute::cache::ResponseCache;
    use flowroute::classifier::KeywordClassifier;
    use flowroute::executor::WorkflowExecutor;
    use flowroute::registry::WorkflowLoader;
    use flowroute::router::WorkflowRouter;
    use flowroute::testing::mocks::MemoryDocumentStore;
    use std::sync::Arc;
    use std::time::Duration;

    let router = WorkflowRouter::new(
        Arc::new(WorkflowLoader::new(
            Arc::new(MemoryDocumentStore::failing()),
            Duration::from_secs(300),
        )),
        Arc::new(KeywordClassifier::new()),
        Arc::new(WorkflowExecutor::new(
            Arc::new(MockLlmProvider::single_response("unused")),
            "mock-model".to_string(),
        )),
        Some(ResponseCache::new()),
        None,
    );

    let result = router.route_and_execute("any query", None, true).await;
    assert!(matches!(
        result,
        Err(RouterError::RegistryUnavailable { .. })
    ));

    assert!(matches!(
        router.list_workflows().await,
        Err(RouterError::RegistryUnavailable { .. })
    ));
}
