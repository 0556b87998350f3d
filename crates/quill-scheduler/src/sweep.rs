use std::sync::Arc;
use std::time::Duration;

use quill_core::config::SchedulerConfig;
use quill_core::{Clock, Schedule};
use quill_store::ContentStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::evaluator::CronExpr;
use crate::job::{GenerationJob, JobHandle, JobOrigin};

/// What one sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Schedulable agents examined.
    pub checked: usize,
    /// Agents whose cron fired inside the poll window.
    pub due: usize,
    /// Due agents skipped because a previous run still holds the lease.
    pub leased: usize,
    /// Agents skipped because of a bad cron expression or a store error.
    pub errors: usize,
    pub jobs: Vec<JobHandle>,
}

impl SweepReport {
    pub fn dispatched(&self) -> usize {
        self.jobs.len()
    }
}

/// Periodic driver that turns due schedules into generation jobs.
pub struct ScheduleSweep {
    store: Arc<ContentStore>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    window_secs: i64,
    interval: Duration,
}

impl ScheduleSweep {
    pub fn new(
        store: Arc<ContentStore>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            window_secs: config.poll_window_secs(),
            interval: Duration::from_secs(config.sweep_interval_minutes.max(1) * 60),
        }
    }

    /// Evaluate every schedulable agent once. A bad cron string or store
    /// error for one agent is logged and that agent skipped.
    #[instrument(skip(self))]
    pub fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let agents = self.store.list_schedulable_agents()?;
        let leases = self.dispatcher.leases();
        let mut report = SweepReport::default();

        for agent in agents {
            report.checked += 1;
            let Some(expression) = agent.schedule_cron.as_deref() else {
                continue;
            };
            let cron = match CronExpr::parse(expression) {
                Ok(cron) => cron,
                Err(e) => {
                    warn!(agent_id = %agent.id, error = %e, "skipping agent with invalid schedule");
                    report.errors += 1;
                    continue;
                }
            };

            if let Err(e) = self.store.set_next_run(&agent.id, cron.next_fire(now)) {
                warn!(agent_id = %agent.id, error = %e, "could not record next run");
            }

            if !cron.is_due(now, self.window_secs) {
                continue;
            }
            report.due += 1;

            let Some(token) = leases.try_acquire(&agent.id, now) else {
                info!(agent_id = %agent.id, "previous run still in flight, not dispatching");
                report.leased += 1;
                continue;
            };

            let schedule = match self.store.get_schedule_for_agent(&agent.id) {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!(agent_id = %agent.id, error = %e, "could not load schedule");
                    leases.release(&agent.id, token);
                    report.errors += 1;
                    continue;
                }
            };

            let job = GenerationJob {
                id: Uuid::now_v7(),
                agent_id: agent.id.clone(),
                topic: None,
                keyword: schedule.as_ref().and_then(Schedule::next_keyword),
                length: schedule.as_ref().map(|s| s.content_length),
                origin: JobOrigin::Scheduled,
                lease: Some(token),
            };
            info!(
                agent_id = %agent.id,
                job_id = %job.id,
                keyword = job.keyword.as_deref().unwrap_or("-"),
                "dispatching scheduled generation"
            );
            report.jobs.push(self.dispatcher.enqueue(job));
        }

        info!(
            agents_checked = report.checked,
            due = report.due,
            dispatched = report.dispatched(),
            "schedule sweep complete"
        );
        Ok(report)
    }

    /// Sweep on a fixed interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "schedule sweep started");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once() {
                        error!("schedule sweep failed: {e}");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("schedule sweep shutting down");
                    break;
                }
            }
        }
    }
}
