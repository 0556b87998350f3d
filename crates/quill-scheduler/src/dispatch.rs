//! Dispatch & retry engine.
//!
//! Every submitted job runs on a spawned task gated by a semaphore sized to
//! the configured worker count. A job retries its whole pipeline with
//! exponential backoff until it succeeds, hits a non-retryable error, runs
//! out of retries, or exceeds the execution ceiling.

use std::sync::Arc;
use std::time::Duration;

use quill_core::config::DispatchConfig;
use quill_core::{Clock, Post};
use quill_pipeline::{ContentGenerator, PipelineRun};
use quill_store::ContentStore;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, warn, Instrument};

use crate::error::{Result, SchedulerError};
use crate::job::{FailureKind, GenerationJob, JobHandle, JobOutcome};
use crate::lease::LeaseTable;
use crate::retry::RetryPolicy;

/// Cheap to clone; all clones feed the same worker pool.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ContentStore>,
    generator: Arc<ContentGenerator>,
    clock: Arc<dyn Clock>,
    leases: Arc<LeaseTable>,
    policy: RetryPolicy,
    ceiling: Duration,
    retry_permanent_errors: bool,
    resume_from_checkpoint: bool,
    workers: Semaphore,
    tracker: TaskTracker,
}

enum Attempted {
    Committed(Post),
    Skipped(String),
}

#[derive(Default)]
struct Progress {
    attempts: u32,
    backoff: Vec<Duration>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<ContentStore>,
        generator: Arc<ContentGenerator>,
        clock: Arc<dyn Clock>,
        leases: Arc<LeaseTable>,
        config: &DispatchConfig,
    ) -> Self {
        let worker_count = config.workers.max(1);
        Self {
            inner: Arc::new(Inner {
                store,
                generator,
                clock,
                leases,
                policy: RetryPolicy::from_config(config),
                ceiling: Duration::from_secs(config.execution_ceiling_secs),
                retry_permanent_errors: config.retry_permanent_errors,
                resume_from_checkpoint: config.resume_from_checkpoint,
                workers: Semaphore::new(worker_count),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Lease table shared with the schedule sweep.
    pub fn leases(&self) -> &Arc<LeaseTable> {
        &self.inner.leases
    }

    /// Queue a generation for `agent_id` outside of its schedule.
    pub fn submit(
        &self,
        agent_id: &str,
        topic: Option<String>,
        keyword: Option<String>,
    ) -> JobHandle {
        self.enqueue(GenerationJob::manual(agent_id, topic, keyword))
    }

    /// Queue a prepared job. Must be called from within a Tokio runtime.
    pub fn enqueue(&self, job: GenerationJob) -> JobHandle {
        let (tx, rx) = oneshot::channel();
        let handle = JobHandle::new(job.id, job.agent_id.clone(), rx);
        let inner = self.inner.clone();
        let span = info_span!("job", job_id = %job.id, agent_id = %job.agent_id);

        self.inner.tracker.spawn(
            async move {
                let outcome = inner.process(job).await;
                // the caller may have dropped its handle
                let _ = tx.send(outcome);
            }
            .instrument(span),
        );
        handle
    }

    /// Wait until every job queued so far has finished, including jobs still
    /// waiting for a worker. The dispatcher accepts new jobs afterwards.
    pub async fn drain(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}

impl Inner {
    async fn process(&self, job: GenerationJob) -> JobOutcome {
        let outcome = match self.workers.acquire().await {
            Ok(_permit) => match job.lease {
                // the lease TTL counts from here, alongside the execution ceiling
                Some(token) if !self.leases.renew(&job.agent_id, token, self.clock.now()) => {
                    warn!("lease expired while queued and was taken over");
                    JobOutcome::Skipped {
                        reason: "lease lost while waiting for a worker".to_string(),
                    }
                }
                _ => self.run_job(&job).await,
            },
            Err(_) => JobOutcome::Skipped {
                reason: "worker pool closed".to_string(),
            },
        };
        if let Some(token) = job.lease {
            self.leases.release(&job.agent_id, token);
        }
        outcome
    }

    async fn run_job(&self, job: &GenerationJob) -> JobOutcome {
        let mut progress = Progress::default();
        let result = tokio::time::timeout(self.ceiling, self.attempt_loop(job, &mut progress)).await;

        let err = match result {
            Ok(Ok(Attempted::Committed(post))) => {
                info!(
                    post_id = %post.id,
                    status = %post.status,
                    attempts = progress.attempts,
                    "generation job succeeded"
                );
                return JobOutcome::Succeeded {
                    post_id: post.id,
                    attempts: progress.attempts,
                    backoff: progress.backoff,
                };
            }
            Ok(Ok(Attempted::Skipped(reason))) => {
                warn!(%reason, "generation job skipped");
                return JobOutcome::Skipped { reason };
            }
            Ok(Err(e)) => e,
            Err(_) => SchedulerError::Timeout {
                secs: self.ceiling.as_secs(),
            },
        };

        let kind = err.failure_kind();
        error!(
            %kind,
            attempts = progress.attempts,
            error = %err,
            "generation job failed"
        );
        let permanent = kind == FailureKind::Permanent;
        if let Err(e) = self
            .store
            .record_failure(&job.agent_id, permanent, self.clock.now())
        {
            error!(error = %e, "failed to record job failure");
        }

        JobOutcome::Failed {
            kind,
            attempts: progress.attempts,
            backoff: progress.backoff,
            error: err.to_string(),
        }
    }

    async fn attempt_loop(&self, job: &GenerationJob, progress: &mut Progress) -> Result<Attempted> {
        let mut checkpoint: Option<PipelineRun> = None;
        loop {
            progress.attempts += 1;
            let err = match self.attempt(job, &mut checkpoint).await {
                Ok(done) => return Ok(done),
                Err(e) => e,
            };

            let retries = progress.attempts - 1;
            let retryable = match err.failure_kind() {
                FailureKind::Transient => true,
                FailureKind::Permanent => self.retry_permanent_errors,
                FailureKind::Timeout => false,
            };
            if !retryable || !self.policy.allows_retry(retries) {
                return Err(err);
            }

            let delay = self.policy.delay_for(retries + 1);
            warn!(
                attempt = progress.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "generation attempt failed, retrying"
            );
            progress.backoff.push(delay);
            tokio::time::sleep(delay).await;

            if !self.resume_from_checkpoint {
                checkpoint = None;
            }
        }
    }

    async fn attempt(
        &self,
        job: &GenerationJob,
        checkpoint: &mut Option<PipelineRun>,
    ) -> Result<Attempted> {
        let agent = match self.store.get_agent(&job.agent_id)? {
            Some(agent) if agent.is_active => agent,
            Some(_) => return Ok(Attempted::Skipped("agent is inactive".to_string())),
            None => return Ok(Attempted::Skipped("agent not found".to_string())),
        };

        let mut run = match checkpoint.take() {
            Some(run) => run,
            None => self.generator.prepare(
                &agent,
                job.topic.as_deref(),
                job.keyword.as_deref(),
                job.length,
            ),
        };

        let generated = match self.generator.execute(&mut run).await {
            Ok(generated) => generated,
            Err(e) => {
                *checkpoint = Some(run);
                return Err(e.into());
            }
        };

        let new_post = generated.into_new_post(&agent.id);
        match self.store.commit_generation(&new_post, self.clock.now()) {
            Ok(post) => Ok(Attempted::Committed(post)),
            Err(e) => {
                *checkpoint = Some(run);
                Err(e.into())
            }
        }
    }
}
