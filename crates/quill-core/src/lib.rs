//! `quill-core`: shared domain types, configuration and the run-stats tracker.

pub mod clock;
pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::QuillConfig;
pub use error::{QuillError, Result};
pub use stats::{RunOutcome, RunStats};
pub use types::{
    Agent, ContentLength, NewPost, Post, PostStatus, Schedule, ScheduleInterval, SeoMetadata,
};
