use quill_pipeline::PipelineError;
use quill_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::job::FailureKind;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Unparseable cron string; isolated to the agent that owns it.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Job exceeded its execution ceiling of {secs}s")]
    Timeout { secs: u64 },

    /// The worker went away without reporting an outcome.
    #[error("Job {job_id} was dropped before completing")]
    JobDropped { job_id: Uuid },
}

impl SchedulerError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SchedulerError::Timeout { .. } => FailureKind::Timeout,
            SchedulerError::Store(StoreError::Database(_)) => FailureKind::Transient,
            SchedulerError::Pipeline(e) if e.is_transient() => FailureKind::Transient,
            SchedulerError::JobDropped { .. } => FailureKind::Transient,
            SchedulerError::InvalidCron { .. }
            | SchedulerError::Store(_)
            | SchedulerError::Pipeline(_) => FailureKind::Permanent,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
