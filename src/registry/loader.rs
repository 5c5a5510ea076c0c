//! Workflow loader with TTL caching
//!
//! Reads workflow definitions through a [`DocumentStore`], validates each
//! document against the embedded schema, and caches results in memory.
//! Caches expire after the configured TTL and can be cleared explicitly
//! via [`WorkflowLoader::reload`]; there is no background sweep.

use crate::registry::definition::{
    WorkflowDefinition, WorkflowSummary, WORKFLOW_DOCUMENT_SCHEMA,
};
use crate::registry::store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct CachedList {
    definitions: Vec<WorkflowDefinition>,
    cached_at: SystemTime,
}

struct CachedDefinition {
    definition: WorkflowDefinition,
    cached_at: SystemTime,
}

fn is_fresh(cached_at: SystemTime, ttl: Duration) -> bool {
    match cached_at.elapsed() {
        Ok(elapsed) => elapsed < ttl,
        // Clock went backwards; treat as stale
        Err(_) => false,
    }
}

/// Registry cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCacheStats {
    pub definition_cache_size: usize,
    pub list_cache_valid: bool,
    pub cache_ttl_secs: u64,
}

/// Loads and caches workflow definitions from a document store
pub struct WorkflowLoader {
    store: Arc<dyn DocumentStore>,
    cache_ttl: Duration,
    validator: jsonschema::Validator,
    list_cache: RwLock<Option<CachedList>>,
    definition_cache: RwLock<HashMap<String, CachedDefinition>>,
}

impl WorkflowLoader {
    /// Create a loader over the given store
    pub fn new(store: Arc<dyn DocumentStore>, cache_ttl: Duration) -> Self {
        let schema: serde_json::Value = serde_json::from_str(WORKFLOW_DOCUMENT_SCHEMA)
            .expect("embedded workflow schema is valid JSON");
        let validator =
            jsonschema::validator_for(&schema).expect("embedded workflow schema compiles");

        Self {
            store,
            cache_ttl,
            validator,
            list_cache: RwLock::new(None),
            definition_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Parse a raw document, skipping anything that fails schema validation
    fn parse_document(&self, document: &serde_json::Value) -> Option<WorkflowDefinition> {
        if !self.validator.is_valid(document) {
            let id = document
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<missing id>");
            warn!(workflow_id = %id, "Skipping workflow document that fails schema validation");
            return None;
        }

        match serde_json::from_value::<WorkflowDefinition>(document.clone()) {
            Ok(definition) => Some(definition),
            Err(e) => {
                warn!("Skipping undeserializable workflow document: {}", e);
                None
            }
        }
    }

    /// Fetch all definitions, refreshing the list cache when stale
    ///
    /// Includes disabled definitions; callers filter per use. Admin
    /// listings need to see disabled entries, the router must not.
    async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        {
            let cache = self.list_cache.read().await;
            if let Some(ref cached) = *cache {
                if is_fresh(cached.cached_at, self.cache_ttl) {
                    debug!("Workflow list cache hit");
                    return Ok(cached.definitions.clone());
                }
            }
        }

        let documents = self.store.fetch_all().await?;
        let definitions: Vec<WorkflowDefinition> = documents
            .iter()
            .filter_map(|doc| self.parse_document(doc))
            .collect();

        debug!(
            "Cached workflow list ({} of {} documents valid)",
            definitions.len(),
            documents.len()
        );

        let mut cache = self.list_cache.write().await;
        *cache = Some(CachedList {
            definitions: definitions.clone(),
            cached_at: SystemTime::now(),
        });

        Ok(definitions)
    }

    /// Get an enabled workflow definition by id
    ///
    /// Returns `None` when the workflow is missing or disabled, matching
    /// the read path's view of the registry.
    pub async fn get_workflow(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        {
            let cache = self.definition_cache.read().await;
            if let Some(cached) = cache.get(workflow_id) {
                if is_fresh(cached.cached_at, self.cache_ttl) {
                    debug!(workflow_id = %workflow_id, "Workflow definition cache hit");
                    return Ok(Some(cached.definition.clone()));
                }
            }
        }

        // Evict a stale entry lazily before refetching
        {
            let mut cache = self.definition_cache.write().await;
            if let Some(cached) = cache.get(workflow_id) {
                if !is_fresh(cached.cached_at, self.cache_ttl) {
                    cache.remove(workflow_id);
                }
            }
        }

        let Some(document) = self.store.fetch(workflow_id).await? else {
            debug!(workflow_id = %workflow_id, "Workflow not found in store");
            return Ok(None);
        };

        let Some(definition) = self.parse_document(&document) else {
            return Ok(None);
        };

        if !definition.is_enabled() {
            debug!(workflow_id = %workflow_id, "Workflow is disabled");
            return Ok(None);
        }

        let mut cache = self.definition_cache.write().await;
        cache.insert(
            workflow_id.to_string(),
            CachedDefinition {
                definition: definition.clone(),
                cached_at: SystemTime::now(),
            },
        );

        Ok(Some(definition))
    }

    /// List enabled workflows, optionally filtered by category
    pub async fn list_workflows(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<WorkflowSummary>, StoreError> {
        let definitions = self.load_all().await?;

        Ok(definitions
            .iter()
            .filter(|d| d.is_enabled())
            .filter(|d| match category {
                Some(wanted) => d
                    .category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
                None => true,
            })
            .map(WorkflowDefinition::summary)
            .collect())
    }

    /// Search enabled workflows by keywords (all keywords must match)
    pub async fn search_workflows(
        &self,
        keywords: &[&str],
    ) -> Result<Vec<WorkflowSummary>, StoreError> {
        let definitions = self.load_all().await?;

        Ok(definitions
            .iter()
            .filter(|d| d.is_enabled())
            .filter(|d| keywords.iter().all(|k| d.matches_keyword(k)))
            .map(WorkflowDefinition::summary)
            .collect())
    }

    /// Drop all cached state so the next read refetches from the store
    pub async fn reload(&self) {
        let mut list_cache = self.list_cache.write().await;
        *list_cache = None;
        drop(list_cache);

        let mut definition_cache = self.definition_cache.write().await;
        definition_cache.clear();

        debug!("Workflow caches cleared");
    }

    /// Cache statistics for diagnostics
    pub async fn cache_stats(&self) -> RegistryCacheStats {
        let list_cache = self.list_cache.read().await;
        let list_cache_valid = list_cache
            .as_ref()
            .is_some_and(|c| is_fresh(c.cached_at, self.cache_ttl));
        drop(list_cache);

        let definition_cache = self.definition_cache.read().await;

        RegistryCacheStats {
            definition_cache_size: definition_cache.len(),
            list_cache_valid,
            cache_ttl_secs: self.cache_ttl.as_secs(),
        }
    }

    /// Check that the underlying store is reachable
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }
}
