//! LLM provider integrations
//!
//! Provider abstraction and concrete backends used for both intent
//! classification and workflow execution.

pub mod provider;
pub mod providers;

pub use provider::{
    ChunkStream, CompletionRequest, CompletionResponse, LlmError, LlmProvider, Message,
    MessageRole, StreamChunk, TokenUsage,
};
pub use providers::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider};
