//! Run statistics kept on each schedule.
//!
//! The tracker is a pure update: the store loads the counters, applies
//! [`RunStats::record`] and writes them back inside the same transaction
//! as the post (or failure) it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final outcome of one dispatched generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    /// Retries exhausted, or a permanent error failed fast.
    Failed { permanent: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Always `successful_runs + failed_runs`.
    pub total_runs: u32,
    pub successful_runs: u32,
    pub failed_runs: u32,
    /// Subset of `failed_runs` caused by non-retryable errors.
    pub permanent_failures: u32,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn record(&mut self, outcome: RunOutcome, now: DateTime<Utc>) {
        self.total_runs += 1;
        match outcome {
            RunOutcome::Succeeded => {
                self.successful_runs += 1;
                self.last_run = Some(now);
            }
            RunOutcome::Failed { permanent } => {
                self.failed_runs += 1;
                if permanent {
                    self.permanent_failures += 1;
                }
            }
        }
    }
}
