use quill_core::{PostStatus, QuillError};
use thiserror::Error;

/// Errors that can occur within the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Agent not found: {id}")]
    AgentNotFound { id: String },

    #[error("No schedule for agent {agent_id}")]
    ScheduleNotFound { agent_id: String },

    /// An agent may own at most one schedule.
    #[error("Agent {agent_id} already has a schedule")]
    ScheduleExists { agent_id: String },

    #[error("Post not found: {id}")]
    PostNotFound { id: String },

    #[error("Post {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: PostStatus,
        to: PostStatus,
    },

    #[error(transparent)]
    Invalid(#[from] QuillError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
