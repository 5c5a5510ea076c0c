//! Configuration loading and validation

use flowroute::config::{ClassifierStrategy, ConfigError, RouterConfig};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

const VALID_CONFIG: &str = r#"
[router]
fallback_workflow = "general-assistant"

[registry]
endpoint = "https://store.example.com"
api_key_env = "REGISTRY_API_KEY"
cache_ttl_secs = 120

[cache]
enabled = true
ttl_secs = 300

[classifier]
strategy = "llm"

[classifier.llm]
model = "gpt-4o-mini"
temperature = 0.2

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#;

#[test]
fn test_load_valid_config() {
    let file = write_config(VALID_CONFIG);

    let config = RouterConfig::load_from_file(file.path()).unwrap();

    assert_eq!(
        config.router.fallback_workflow.as_deref(),
        Some("general-assistant")
    );
    assert_eq!(config.registry.endpoint, "https://store.example.com");
    assert_eq!(config.registry.cache_ttl_secs, 120);
    assert_eq!(config.classifier.strategy, ClassifierStrategy::Llm);
    assert_eq!(config.cache.ttl_secs, 300);
}

#[test]
fn test_missing_file() {
    let result = RouterConfig::load_from_file(std::path::Path::new("/nonexistent/flowroute.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml() {
    let file = write_config("this is not [valid toml");
    let result = RouterConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_llm_strategy_without_llm_table_rejected_at_load() {
    let config = r#"
[router]

[registry]
endpoint = "https://store.example.com"

[classifier]
strategy = "llm"

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#;

    let file = write_config(config);
    let result = RouterConfig::load_from_file(file.path());

    // Rejected at validation time, not at first use
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_keyword_strategy_minimal_config() {
    let config = r#"
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

    let file = write_config(config);
    let config = RouterConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.classifier.strategy, ClassifierStrategy::Keyword);
    assert!(config.classifier.llm.is_none());
    // Defaults fill in everything else
    assert_eq!(config.registry.database, "workflows");
    assert_eq!(config.registry.retry_attempts, 3);
    assert!(config.cache.enabled);
}

#[test]
fn test_invalid_fallback_id_rejected() {
    let config = r#"
[router]
fallback_workflow = "not a valid id!"

[registry]
endpoint = "http://localhost:8081"

[classifier]
strategy = "keyword"

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#;

    let file = write_config(config);
    let result = RouterConfig::load_from_file(file.path());
    assert!(matches!(result, Err(ConfigError::InvalidWorkflowId(_))));
}
