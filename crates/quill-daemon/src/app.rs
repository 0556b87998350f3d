//! Wiring: one store, one clock, one dispatcher, shared by the sweep and
//! the publish timer.

use std::sync::Arc;

use anyhow::{bail, Context};
use quill_core::config::AnthropicConfig;
use quill_core::{Clock, QuillConfig, SystemClock};
use quill_llm::{AnthropicClient, CompletionService};
use quill_pipeline::ContentGenerator;
use quill_scheduler::{Dispatcher, LeaseTable, PublishTimer, ScheduleSweep};
use quill_seo::StandardSeo;
use quill_store::ContentStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct App {
    pub config: QuillConfig,
    pub store: Arc<ContentStore>,
    pub clock: Arc<dyn Clock>,
}

impl App {
    pub fn open(config: QuillConfig) -> anyhow::Result<Self> {
        let path = &config.database.path;
        info!(path = %path, "opening SQLite database");
        let store = ContentStore::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;
        Ok(Self {
            config,
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
        })
    }

    /// Build the dispatcher. Fails when no completion provider is configured.
    pub fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let completion = build_completion(&self.config)?;
        let generator = Arc::new(ContentGenerator::new(
            completion,
            Arc::new(StandardSeo),
            self.config.generation.clone(),
        ));
        let leases = Arc::new(LeaseTable::new(chrono::Duration::seconds(
            self.config.scheduler.lease_ttl_secs as i64,
        )));
        Ok(Dispatcher::new(
            self.store.clone(),
            generator,
            self.clock.clone(),
            leases,
            &self.config.dispatch,
        ))
    }

    pub fn sweep(&self, dispatcher: Dispatcher) -> ScheduleSweep {
        ScheduleSweep::new(
            self.store.clone(),
            dispatcher,
            self.clock.clone(),
            &self.config.scheduler,
        )
    }

    pub fn publisher(&self) -> PublishTimer {
        PublishTimer::new(self.store.clone(), self.clock.clone(), &self.config.scheduler)
    }

    /// Run the sweep and the publish timer until Ctrl-C, then let in-flight
    /// jobs finish.
    pub async fn run(&self) -> anyhow::Result<()> {
        let dispatcher = self.dispatcher()?;
        let cancel = CancellationToken::new();

        let sweep = tokio::spawn(self.sweep(dispatcher.clone()).run(cancel.clone()));
        let publisher = tokio::spawn(self.publisher().run(cancel.clone()));
        info!("quill daemon running, press Ctrl-C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("shutdown requested");
        cancel.cancel();

        let _ = sweep.await;
        let _ = publisher.await;
        dispatcher.drain().await;
        info!("quill daemon stopped");
        Ok(())
    }
}

/// providers.anthropic, else the ANTHROPIC_API_KEY env var.
fn build_completion(config: &QuillConfig) -> anyhow::Result<Arc<dyn CompletionService>> {
    let anthropic = match config.providers.anthropic.clone() {
        Some(anthropic) => anthropic,
        None => match std::env::var("ANTHROPIC_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => AnthropicConfig {
                api_key,
                base_url: "https://api.anthropic.com".to_string(),
                timeout_secs: 120,
            },
            _ => bail!(
                "no completion provider configured: set [providers.anthropic] or ANTHROPIC_API_KEY"
            ),
        },
    };
    info!(base_url = %anthropic.base_url, model = %config.generation.model, "completion provider: Anthropic");
    let client = AnthropicClient::new(&anthropic, &config.generation.model)?;
    Ok(Arc::new(client))
}
