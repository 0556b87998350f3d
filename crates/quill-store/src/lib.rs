//! `quill-store`: SQLite persistence for agents, schedules and posts.
//!
//! All multi-row writes that describe one event (a generated post plus the
//! schedule counters it bumps, a schedule plus the agent's cached cron
//! expression) are committed in a single transaction.

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::ContentStore;
