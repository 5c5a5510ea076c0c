//! Registry loader behavior through the router surface

use flowroute::testing::mocks::MockLlmProvider;

mod test_helpers;
use test_helpers::{build_router, default_documents, workflow_doc};

#[tokio::test]
async fn test_list_workflows_never_returns_disabled() {
    let mut documents = default_documents();
    documents.push(workflow_doc(
        "retired-flow",
        "legacy",
        "Old workflow kept for history",
        false,
    ));

    let rig = build_router(
        documents,
        MockLlmProvider::single_response("unused"),
        None,
        None,
    );

    let workflows = rig.router.list_workflows().await.unwrap();

    assert_eq!(workflows.len(), 3);
    assert!(workflows.iter().all(|w| w.enabled));
    assert!(!workflows.iter().any(|w| w.id == "retired-flow"));
}

#[tokio::test]
async fn test_workflow_info_round_trip() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("unused"),
        None,
        None,
    );

    let info = rig.router.workflow_info("customer-support").await.unwrap();
    let definition = info.expect("workflow should exist");

    assert_eq!(definition.id, "customer-support");
    assert_eq!(definition.category.as_deref(), Some("support"));
    assert!(definition
        .agent_config
        .instructions
        .contains("customer-support"));

    let missing = rig.router.workflow_info("nope").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_list_is_cached_until_reload() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("unused"),
        None,
        None,
    );

    rig.router.list_workflows().await.unwrap();
    rig.router.list_workflows().await.unwrap();
    assert_eq!(rig.store.fetch_all_count(), 1);

    rig.router.reload_workflows().await;
    rig.router.list_workflows().await.unwrap();
    assert_eq!(rig.store.fetch_all_count(), 2);
}

#[tokio::test]
async fn test_new_workflow_visible_after_reload() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("unused"),
        None,
        None,
    );

    assert_eq!(rig.router.list_workflows().await.unwrap().len(), 3);

    // Admin write path adds a workflow behind the loader's back
    use flowroute::registry::DocumentStore;
    rig.store
        .upsert(&workflow_doc(
            "order-tracking",
            "support",
            "Tracks shipment status",
            true,
        ))
        .await
        .unwrap();

    // Still served from cache
    assert_eq!(rig.router.list_workflows().await.unwrap().len(), 3);

    rig.router.reload_workflows().await;
    let workflows = rig.router.list_workflows().await.unwrap();
    assert_eq!(workflows.len(), 4);
    assert!(workflows.iter().any(|w| w.id == "order-tracking"));
}

#[tokio::test]
async fn test_router_stats_shape() {
    let rig = build_router(
        default_documents(),
        MockLlmProvider::single_response("answer"),
        Some(std::time::Duration::from_secs(300)),
        None,
    );

    rig.router
        .route_and_collect("I need help with my order #12345", None)
        .await
        .unwrap();

    let stats = rig.router.stats().await;
    assert_eq!(stats.response_cache.unwrap().valid_entries, 1);
    assert!(stats.registry_cache.list_cache_valid);
    assert_eq!(stats.registry_cache.cache_ttl_secs, 300);
}
