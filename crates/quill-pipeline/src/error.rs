use quill_llm::CompletionError;
use thiserror::Error;

use crate::state::PipelineStep;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The agent lacks a field the system prompt needs.
    #[error("Agent {agent_id} is missing required field: {field}")]
    MissingField {
        agent_id: String,
        field: &'static str,
    },

    #[error("Generated content is empty")]
    EmptyContent,

    #[error("Pipeline finished without output")]
    NoOutput,

    #[error("{step} failed: {source}")]
    Completion {
        step: PipelineStep,
        #[source]
        source: CompletionError,
    },
}

impl PipelineError {
    /// Only completion-service failures can succeed on retry; validation
    /// failures reproduce every time.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Completion { source, .. } => source.is_transient(),
            PipelineError::MissingField { .. }
            | PipelineError::EmptyContent
            | PipelineError::NoOutput => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
