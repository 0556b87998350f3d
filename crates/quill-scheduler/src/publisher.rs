use std::sync::Arc;
use std::time::Duration;

use quill_core::config::SchedulerConfig;
use quill_core::{Clock, Post};
use quill_store::ContentStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;

/// Promotes scheduled posts whose time has come. Independent of the sweep.
pub struct PublishTimer {
    store: Arc<ContentStore>,
    clock: Arc<dyn Clock>,
    tick: Duration,
}

impl PublishTimer {
    pub fn new(store: Arc<ContentStore>, clock: Arc<dyn Clock>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            tick: Duration::from_secs(config.publish_tick_secs.max(1)),
        }
    }

    /// Publish everything due now. Safe to call repeatedly: a post leaves the
    /// `scheduled` state in the same statement that publishes it.
    pub fn tick_once(&self) -> Result<Vec<Post>> {
        let published = self.store.publish_due(self.clock.now())?;
        for post in &published {
            info!(post_id = %post.id, agent_id = %post.agent_id, title = %post.title, "post published");
        }
        if !published.is_empty() {
            info!(count = published.len(), "publish tick complete");
        }
        Ok(published)
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(tick_secs = self.tick.as_secs(), "publish timer started");
        let mut interval = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick_once() {
                        error!("publish tick failed: {e}");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("publish timer shutting down");
                    break;
                }
            }
        }
    }
}
