//! Configuration for the workflow router
//!
//! All secrets are referenced indirectly through environment variable
//! names (`*_env` fields) and resolved at runtime, never stored in the
//! config file or in memory longer than needed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level router configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    pub router: RouterSection,
    pub registry: RegistrySection,
    #[serde(default)]
    pub cache: CacheSection,
    pub classifier: ClassifierConfig,
    pub llm: LlmSection,
}

/// Router behavior settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterSection {
    /// Workflow to fall back to when classification finds no match
    pub fallback_workflow: Option<String>,
}

/// Workflow registry (document store) connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrySection {
    /// Document store base URL
    pub endpoint: String,
    /// Environment variable containing the store access key
    pub api_key_env: Option<String>,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Container holding workflow definition documents
    #[serde(default = "default_container")]
    pub container: String,
    /// TTL for the in-memory definition cache, in seconds
    #[serde(default = "default_registry_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry attempts for transient (5xx) store failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSection {
    /// Enable the response cache
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TTL for cached responses, in seconds
    #[serde(default = "default_response_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_response_ttl_secs(),
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Classification strategy: "llm" or "keyword"
    pub strategy: ClassifierStrategy,

    /// LLM classifier configuration (required if strategy = "llm")
    pub llm: Option<LlmClassifierConfig>,
}

/// Classification strategy selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    Llm,
    Keyword,
}

/// LLM classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmClassifierConfig {
    /// Model identifier for classification calls
    pub model: String,
    /// Temperature for classification (default: 0.3, matching routing determinism needs)
    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,
}

/// Execution backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name (e.g., "anthropic", "openai")
    pub provider: String,
    /// Default model when a workflow definition does not name one
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Optional base URL override (for OpenAI-compatible endpoints)
    pub base_url: Option<String>,
    /// Optional max tokens for workflow executions
    pub max_tokens: Option<u32>,
}

fn default_database() -> String {
    "workflows".to_string()
}

fn default_container() -> String {
    "workflow_definitions".to_string()
}

fn default_registry_ttl_secs() -> u64 {
    300
}

fn default_response_ttl_secs() -> u64 {
    300
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retry_attempts() -> usize {
    3
}

fn default_classifier_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

impl ClassifierConfig {
    /// Validate classifier configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy == ClassifierStrategy::Llm && self.llm.is_none() {
            return Err(ConfigError::InvalidConfig(
                "LLM classifier strategy requires [classifier.llm] configuration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid workflow ID format: {0}")]
    InvalidWorkflowId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RouterConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classifier.validate()?;

        if let Some(ref fallback) = self.router.fallback_workflow {
            crate::registry::validate_workflow_id(fallback)
                .map_err(|_| ConfigError::InvalidWorkflowId(fallback.clone()))?;
        }

        if self.registry.endpoint.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "registry.endpoint must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the LLM API key from its environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    /// Get the registry access key, if one is configured
    pub fn get_registry_api_key(&self) -> Option<String> {
        self.registry
            .api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[router]
fallback_workflow = "general-assistant"

[registry]
endpoint = "http://localhost:8081"
database = "workflows"
container = "workflow_definitions"

[cache]
enabled = true
ttl_secs = 300

[classifier]
strategy = "keyword"

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[router]
fallback_workflow = "general-assistant"

[registry]
endpoint = "https://store.example.com"
api_key_env = "REGISTRY_API_KEY"
database = "workflows"
container = "workflow_definitions"
cache_ttl_secs = 120
timeout_ms = 3000
retry_attempts = 5

[cache]
enabled = true
ttl_secs = 600

[classifier]
strategy = "llm"

[classifier.llm]
model = "gpt-4o-mini"
temperature = 0.2

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
max_tokens = 4000
"#;

        let config: RouterConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(
            config.router.fallback_workflow.as_deref(),
            Some("general-assistant")
        );
        assert_eq!(config.registry.endpoint, "https://store.example.com");
        assert_eq!(config.registry.cache_ttl_secs, 120);
        assert_eq!(config.registry.retry_attempts, 5);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.classifier.strategy, ClassifierStrategy::Llm);
        assert_eq!(config.llm.max_tokens, Some(4000));

        let llm = config.classifier.llm.unwrap();
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.temperature, 0.2);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let toml_content = r#"
[router]

[registry]
endpoint = "http://localhost:8081"

[classifier]
strategy = "keyword"

[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
api_key_env = "ANTHROPIC_API_KEY"
"#;

        let config: RouterConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.router.fallback_workflow, None);
        assert_eq!(config.registry.database, "workflows");
        assert_eq!(config.registry.container, "workflow_definitions");
        assert_eq!(config.registry.cache_ttl_secs, 300);
        assert_eq!(config.registry.timeout_ms, 5000);
        assert_eq!(config.registry.retry_attempts, 3);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.llm.base_url, None);
    }

    #[test]
    fn test_llm_strategy_requires_llm_table() {
        let toml_content = r#"
[router]

[registry]
endpoint = "http://localhost:8081"

[classifier]
strategy = "llm"
# Missing [classifier.llm] section!

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#;

        // Parses fine - validation happens separately
        let config: RouterConfig = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keyword_strategy_needs_no_llm_table() {
        let config = RouterConfig::test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_classifier_temperature_default() {
        let toml_content = r#"
strategy = "llm"

[llm]
model = "gpt-4o-mini"
"#;
        let config: ClassifierConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.llm.unwrap().temperature, 0.3);
    }

    #[test]
    fn test_invalid_fallback_workflow_id() {
        let mut config = RouterConfig::test_config();
        config.router.fallback_workflow = Some("bad id!".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkflowId(_))
        ));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let mut config = RouterConfig::test_config();
        config.registry.endpoint = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_env_var_error() {
        let mut config = RouterConfig::test_config();
        config.llm.api_key_env = "FLOWROUTE_TEST_VAR_THAT_IS_NEVER_SET".to_string();

        let result = config.get_llm_api_key();
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(_))));
    }
}
