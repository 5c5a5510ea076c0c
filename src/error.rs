//! Error types for workflow routing operations
//!
//! Maps component failures (classification, registry access, backend
//! execution) to a single error surface, with message sanitization so
//! secrets never reach logs or callers.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

/// Main error type for workflow router operations
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Classification failed: {message}")]
    ClassificationFailed { message: String },

    #[error("Workflow registry unavailable: {message}")]
    RegistryUnavailable { message: String },

    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    #[error("Workflow execution failed for '{workflow_id}': {message}")]
    ExecutionFailed { workflow_id: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Registry store error: {0}")]
    StoreError(#[from] crate::registry::StoreError),

    #[error("LLM provider error: {0}")]
    LlmError(#[from] crate::llm::provider::LlmError),
}

impl RouterError {
    /// Create a classification failure error
    pub fn classification_failed<S: Into<String>>(message: S) -> Self {
        Self::ClassificationFailed {
            message: message.into(),
        }
    }

    /// Create a registry unavailable error
    pub fn registry_unavailable<S: Into<String>>(message: S) -> Self {
        Self::RegistryUnavailable {
            message: message.into(),
        }
    }

    /// Create a workflow not found error
    pub fn workflow_not_found<S: Into<String>>(workflow_id: S) -> Self {
        Self::WorkflowNotFound {
            workflow_id: workflow_id.into(),
        }
    }

    /// Create an execution failure error
    pub fn execution_failed<S: Into<String>, M: Into<String>>(workflow_id: S, message: M) -> Self {
        Self::ExecutionFailed {
            workflow_id: workflow_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Render this error as a caller-facing message with secrets redacted
    pub fn user_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }

    /// Whether the failed request may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RouterError::RegistryUnavailable { .. }
                | RouterError::LlmError(crate::llm::provider::LlmError::RateLimitExceeded(_))
                | RouterError::LlmError(crate::llm::provider::LlmError::NetworkError(_))
        )
    }
}

/// Sanitize error messages to prevent sensitive data leakage
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN.replace_all(message, "${1}=***").to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let max_content_len = 500 - truncate_suffix.len();
        let mut cut = max_content_len;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Truncate a user query for log output without leaking the full text
pub fn truncate_query(query: &str, max_chars: usize) -> String {
    if query.chars().count() <= max_chars {
        query.to_string()
    } else {
        let prefix: String = query.chars().take(max_chars).collect();
        format!("{prefix}...")
    }
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
