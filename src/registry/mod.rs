//! Workflow registry
//!
//! Typed workflow definitions, the document-store client that holds them,
//! and a TTL-caching loader that is the router's only read path.

pub mod definition;
pub mod loader;
pub mod store;

pub use definition::{
    validate_workflow_id, AgentProfile, WorkflowDefinition, WorkflowKind, WorkflowMetadata,
    WorkflowSummary,
};
pub use loader::{RegistryCacheStats, WorkflowLoader};
pub use store::{DocumentStore, HttpDocumentStore, StoreConfig, StoreError};
