//! Response caching
//!
//! Caches generated workflow responses so identical queries within the
//! TTL window replay without a second backend call. Expired entries are
//! never returned and are evicted lazily on access; there is no
//! background sweep.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// Cache key derived from the selected workflow and the normalized query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    workflow_id: String,
    normalized_query: String,
}

impl CacheKey {
    /// Build a key from a workflow id and raw query text
    ///
    /// Normalization (trim, lowercase, whitespace collapse) makes
    /// trivially reworded queries share an entry.
    pub fn new(workflow_id: impl Into<String>, query: &str) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            normalized_query: normalize_query(query),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Stable fingerprint for log output; never log the raw query
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Normalize query text for cache-key purposes
pub fn normalize_query(query: &str) -> String {
    query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A cached workflow response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    /// Full response text
    pub text: String,
    /// Number of chunks the original stream produced
    pub chunk_count: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    cached_at: SystemTime,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match self.cached_at.elapsed() {
            Ok(elapsed) => elapsed >= self.ttl,
            // Clock went backwards; treat as expired
            Err(_) => true,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
}

/// TTL-bounded response cache
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with the default TTL of 300 seconds
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(300))
    }

    /// Create a cache with a custom default TTL
    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a cached response if present and not expired
    ///
    /// Expired entries are removed on the way out.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.response.clone()),
            None => None,
        }
    }

    /// Cache a response with the default TTL
    pub async fn put(&self, key: CacheKey, response: CachedResponse) {
        self.put_with_ttl(key, response, self.default_ttl).await;
    }

    /// Cache a response with a custom TTL
    pub async fn put_with_ttl(&self, key: CacheKey, response: CachedResponse, ttl: Duration) {
        let entry = CacheEntry {
            response,
            cached_at: SystemTime::now(),
            ttl,
        };

        let mut entries = self.entries.write().await;
        entries.insert(key, entry);
    }

    /// Remove a specific entry
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(key).is_some()
    }

    /// Clear all entries
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let total = entries.len();
        let expired = entries.values().filter(|e| e.is_expired()).count();

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total - expired,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
