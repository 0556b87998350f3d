//! `quill-scheduler`: decides when agents are due, runs generation jobs on a
//! bounded worker pool with retry and backoff, and promotes scheduled posts.
//!
//! # Drivers
//!
//! | Driver            | Cadence                          | Work                                  |
//! |-------------------|----------------------------------|---------------------------------------|
//! | [`ScheduleSweep`] | `sweep_interval_minutes` (5 min) | due agents → lease → [`Dispatcher`]   |
//! | [`PublishTimer`]  | `publish_tick_secs` (60 s)       | scheduled posts past due → published  |
//!
//! Both loops stop when their `CancellationToken` is cancelled.

pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod job;
pub mod lease;
pub mod publisher;
pub mod retry;
pub mod sweep;

pub use evaluator::{is_due, CronExpr};
pub use dispatch::Dispatcher;
pub use error::{Result, SchedulerError};
pub use job::{FailureKind, GenerationJob, JobHandle, JobOrigin, JobOutcome};
pub use lease::{LeaseTable, LeaseToken};
pub use publisher::PublishTimer;
pub use retry::RetryPolicy;
pub use sweep::{ScheduleSweep, SweepReport};
