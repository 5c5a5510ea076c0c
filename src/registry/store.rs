//! Document store client for workflow definitions
//!
//! The registry is an external document database exposed over HTTP. The
//! router only reads from it; `upsert` exists for admin tooling
//! (seeding, soft deletes) and is never called on the request path.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors from document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store not configured: {0}")]
    NotConfigured(String),
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Store request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),
}

/// Read/write access to a collection of JSON documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch every document in the collection
    async fn fetch_all(&self) -> Result<Vec<Value>, StoreError>;

    /// Fetch one document by id
    async fn fetch(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Create or replace a document (admin path only)
    async fn upsert(&self, document: &Value) -> Result<(), StoreError>;

    /// Check connectivity
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Configuration for the HTTP document store client
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the document store
    pub endpoint: String,
    /// Optional access key sent as a bearer token
    pub api_key: Option<String>,
    /// Database name
    pub database: String,
    /// Container (collection) name
    pub container: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retry attempts for transient (5xx / network) failures
    pub retry_attempts: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            api_key: None,
            database: "workflows".to_string(),
            container: "workflow_definitions".to_string(),
            timeout: Duration::from_millis(5000),
            retry_attempts: 3,
        }
    }
}

impl StoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Collection base URL: {endpoint}/dbs/{database}/colls/{container}/docs
    fn collection_url(&self) -> Result<Url, StoreError> {
        let base = Url::parse(&self.endpoint)
            .map_err(|e| StoreError::NotConfigured(format!("Invalid endpoint URL: {e}")))?;

        base.join(&format!(
            "dbs/{}/colls/{}/docs",
            self.database, self.container
        ))
        .map_err(|e| StoreError::NotConfigured(format!("Invalid collection path: {e}")))
    }
}

/// HTTP implementation of the document store
pub struct HttpDocumentStore {
    config: StoreConfig,
    client: reqwest::Client,
}

impl HttpDocumentStore {
    /// Create a new HTTP document store client
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        // Validate the URL shape up front so misconfiguration fails at
        // construction, not on the first request
        config.collection_url()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        status.is_server_error()
    }

    /// Issue a GET with bounded retry and exponential backoff on 5xx
    async fn get_with_retry(&self, url: Url) -> Result<reqwest::Response, StoreError> {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_attempts {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * (1 << (attempt - 1)) as u64);
                debug!(
                    "Store retry attempt {} after {:?} for {}",
                    attempt, delay, url
                );
                tokio::time::sleep(delay).await;
            }

            match self.apply_auth(self.client.get(url.clone())).send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::is_retryable_status(status) {
                        let message = response.text().await.unwrap_or_default();
                        warn!("Store server error {} on attempt {}", status, attempt + 1);
                        last_error = Some(StoreError::RequestFailed {
                            status: status.as_u16(),
                            message,
                        });
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Store connection error on attempt {}: {}", attempt + 1, e);
                    last_error = Some(StoreError::ConnectionFailed(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| StoreError::ConnectionFailed("all retries exhausted".to_string())))
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch_all(&self) -> Result<Vec<Value>, StoreError> {
        let url = self.config.collection_url()?;
        let response = self.get_with_retry(url).await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        // Accept either a bare array or a {"documents": [...]} envelope
        let documents = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("documents") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(StoreError::InvalidResponse(
                        "expected a document array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(StoreError::InvalidResponse(
                    "expected a document array".to_string(),
                ))
            }
        };

        debug!("Fetched {} documents from store", documents.len());
        Ok(documents)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let mut url = self.config.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| StoreError::NotConfigured("endpoint cannot be a base".to_string()))?
            .push(id);

        let response = self.get_with_retry(url).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        Ok(Some(document))
    }

    async fn upsert(&self, document: &Value) -> Result<(), StoreError> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidResponse("document missing 'id'".to_string()))?;

        let mut url = self.config.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| StoreError::NotConfigured("endpoint cannot be a base".to_string()))?
            .push(id);

        let response = self
            .apply_auth(self.client.put(url))
            .json(document)
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Upserted document '{}'", id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let url = self.config.collection_url()?;
        let response = self
            .apply_auth(self.client.get(url))
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::RequestFailed {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}
