//! `quill-llm`: the text-completion boundary.
//!
//! The generation pipeline only ever talks to [`CompletionService`]; the
//! Anthropic client is the one production implementation.

pub mod anthropic;
pub mod provider;

pub use anthropic::AnthropicClient;
pub use provider::{Completion, CompletionError, CompletionRequest, CompletionService};
