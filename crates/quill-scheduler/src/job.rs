use std::fmt;
use std::time::Duration;

use quill_core::ContentLength;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::lease::LeaseToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// Enqueued by the schedule sweep.
    Scheduled,
    /// Requested directly, e.g. from the command line.
    Manual,
}

/// One unit of work for the dispatcher.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub agent_id: String,
    pub topic: Option<String>,
    pub keyword: Option<String>,
    /// Overrides the agent's preferred length.
    pub length: Option<ContentLength>,
    pub origin: JobOrigin,
    /// Lease held on the agent; released when the job finishes.
    pub lease: Option<LeaseToken>,
}

impl GenerationJob {
    pub fn manual(agent_id: &str, topic: Option<String>, keyword: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            agent_id: agent_id.to_string(),
            topic,
            keyword,
            length: None,
            origin: JobOrigin::Manual,
            lease: None,
        }
    }
}

/// How a failed job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network, throttling, server or store errors. Retried.
    Transient,
    /// Validation errors that reproduce on every attempt. Not retried by default.
    Permanent,
    /// The job ran past its execution ceiling and was aborted.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
            FailureKind::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// Final result of a job, after all retries.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded {
        post_id: String,
        attempts: u32,
        /// Backoff slept before each retry, in order.
        backoff: Vec<Duration>,
    },
    Failed {
        kind: FailureKind,
        attempts: u32,
        backoff: Vec<Duration>,
        error: String,
    },
    /// The agent was missing or inactive; nothing was generated or counted.
    Skipped { reason: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Returned by `submit`; resolves once the job reaches a final outcome.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub agent_id: String,
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(job_id: Uuid, agent_id: String, rx: oneshot::Receiver<JobOutcome>) -> Self {
        Self {
            job_id,
            agent_id,
            rx,
        }
    }

    pub async fn wait(self) -> Result<JobOutcome> {
        let job_id = self.job_id;
        self.rx
            .await
            .map_err(|_| SchedulerError::JobDropped { job_id })
    }
}
