//! Workflow definition documents
//!
//! These types mirror the document shape stored in the workflow registry.
//! Definitions are created and updated by admin tooling; the router only
//! ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A workflow definition as stored in the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    /// Unique workflow identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Routing category (e.g., "support", "sales")
    #[serde(default)]
    pub category: Option<String>,
    /// Description used by the classifier to match intents
    #[serde(default)]
    pub description: Option<String>,
    /// What kind of backend handles this workflow
    #[serde(default)]
    pub kind: WorkflowKind,
    /// Agent configuration applied when the workflow executes
    pub agent_config: AgentProfile,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

/// Closed set of workflow backend kinds
///
/// Modeled as a tagged variant rather than a free-form string so new
/// kinds are a compile-time concern, not a runtime probe.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    /// Instructions-only workflow executed against the chat backend
    #[default]
    Prompt,
    /// Pre-provisioned hosted agent referenced by the definition
    Hosted,
    /// Multi-step workflow graph
    Workflow,
}

impl WorkflowKind {
    /// Whether the backend can emit incremental chunks for this kind
    pub fn supports_streaming(&self) -> bool {
        match self {
            WorkflowKind::Prompt | WorkflowKind::Hosted => true,
            WorkflowKind::Workflow => false,
        }
    }

    /// Whether execution requires a chat-completion backend call
    pub fn requires_backend(&self) -> bool {
        true
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Prompt => "prompt",
            WorkflowKind::Hosted => "hosted",
            WorkflowKind::Workflow => "workflow",
        }
    }
}

/// Agent configuration embedded in a workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    /// Model override; falls back to the router's configured default
    #[serde(default)]
    pub model: Option<String>,
    /// System instructions for the workflow agent
    pub instructions: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

/// Definition lifecycle metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMetadata {
    /// Disabled workflows are invisible to the router
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl Default for WorkflowMetadata {
    fn default() -> Self {
        Self {
            enabled: true,
            version: None,
            tags: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl WorkflowDefinition {
    /// Check if this workflow may be selected by the router
    pub fn is_enabled(&self) -> bool {
        self.metadata.enabled
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Case-insensitive match against id, category, tags, and description tokens
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword_lower = keyword.to_lowercase();

        if self.id.to_lowercase() == keyword_lower {
            return true;
        }

        if let Some(ref category) = self.category {
            if category.to_lowercase() == keyword_lower {
                return true;
            }
        }

        if self
            .metadata
            .tags
            .iter()
            .any(|t| t.to_lowercase() == keyword_lower)
        {
            return true;
        }

        if let Some(ref description) = self.description {
            if description
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == keyword_lower)
            {
                return true;
            }
        }

        false
    }

    /// Summary view for introspection APIs
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            category: self.category.clone(),
            description: self.description.clone(),
            kind: self.kind,
            enabled: self.metadata.enabled,
            version: self.metadata.version.clone(),
            tags: self.metadata.tags.clone(),
        }
    }

    /// Mark the definition disabled (soft delete)
    pub fn disable(&mut self) {
        self.metadata.enabled = false;
        self.metadata.updated_at = Some(Utc::now());
    }
}

/// Summary of a workflow definition for listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub kind: WorkflowKind,
    pub enabled: bool,
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Validate workflow ID format
pub fn validate_workflow_id(workflow_id: &str) -> Result<(), String> {
    let valid_chars = workflow_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if workflow_id.is_empty() || !valid_chars {
        return Err(format!(
            "Workflow ID '{workflow_id}' must match pattern [a-zA-Z0-9._-]+"
        ));
    }

    Ok(())
}

/// Embedded JSON Schema that registry documents must satisfy
pub const WORKFLOW_DOCUMENT_SCHEMA: &str = r##"{
    "$schema": "http://json-schema.org/draft-07/schema#",
    "type": "object",
    "required": ["id", "agent_config"],
    "properties": {
        "id": {
            "type": "string",
            "pattern": "^[a-zA-Z0-9._-]+$"
        },
        "name": { "type": ["string", "null"] },
        "category": { "type": ["string", "null"] },
        "description": { "type": ["string", "null"] },
        "kind": { "enum": ["prompt", "hosted", "workflow"] },
        "agent_config": {
            "type": "object",
            "required": ["instructions"],
            "properties": {
                "model": { "type": ["string", "null"] },
                "instructions": { "type": "string" },
                "temperature": { "type": ["number", "null"] },
                "top_p": { "type": ["number", "null"] }
            }
        },
        "metadata": {
            "type": "object",
            "properties": {
                "enabled": { "type": "boolean" },
                "version": { "type": ["string", "null"] },
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        }
    }
}"##;
