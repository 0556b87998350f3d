use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SWEEP_INTERVAL_MINUTES: u64 = 5;
pub const DEFAULT_PUBLISH_TICK_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;
pub const DEFAULT_EXECUTION_CEILING_SECS: u64 = 3_600; // wall-clock limit for a whole job, retries included
pub const DEFAULT_LEASE_TTL_SECS: u64 = DEFAULT_EXECUTION_CEILING_SECS + 300;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Top-level config (quill.toml + QUILL_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Periodic drivers: the schedule sweep and the publish timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the sweep runs. Also the width of the "due" window.
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,
    #[serde(default = "default_publish_tick_secs")]
    pub publish_tick_secs: u64,
    /// Per-agent lease lifetime; should exceed the execution ceiling.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

impl SchedulerConfig {
    /// The `pollWindowSeconds` argument handed to the cron evaluator.
    pub fn poll_window_secs(&self) -> i64 {
        (self.sweep_interval_minutes * 60) as i64
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_minutes: DEFAULT_SWEEP_INTERVAL_MINUTES,
            publish_tick_secs: DEFAULT_PUBLISH_TICK_SECS,
            lease_ttl_secs: DEFAULT_LEASE_TTL_SECS,
        }
    }
}

/// Worker pool and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    #[serde(default = "default_execution_ceiling_secs")]
    pub execution_ceiling_secs: u64,
    /// When true, validation failures are retried like network failures.
    #[serde(default)]
    pub retry_permanent_errors: bool,
    /// When true, a retried job resumes from the step that failed instead of
    /// starting the pipeline over.
    #[serde(default)]
    pub resume_from_checkpoint: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            execution_ceiling_secs: DEFAULT_EXECUTION_CEILING_SECS,
            retry_permanent_errors: false,
            resume_from_checkpoint: false,
        }
    }
}

/// Completion parameters used by the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Token budget for the short metadata calls (meta title, description, keywords).
    #[serde(default = "default_meta_max_tokens")]
    pub meta_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            meta_max_tokens: default_meta_max_tokens(),
            temperature: default_temperature(),
            language: default_language(),
        }
    }
}

/// Publisher identity used in schema.org markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,
    #[serde(default = "default_site_url")]
    pub url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            url: default_site_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.quill/quill.db", home)
}
fn default_sweep_interval_minutes() -> u64 {
    DEFAULT_SWEEP_INTERVAL_MINUTES
}
fn default_publish_tick_secs() -> u64 {
    DEFAULT_PUBLISH_TICK_SECS
}
fn default_lease_ttl_secs() -> u64 {
    DEFAULT_LEASE_TTL_SECS
}
fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
fn default_backoff_max_secs() -> u64 {
    DEFAULT_BACKOFF_MAX_SECS
}
fn default_execution_ceiling_secs() -> u64 {
    DEFAULT_EXECUTION_CEILING_SECS
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_meta_max_tokens() -> u32 {
    200
}
fn default_temperature() -> f32 {
    0.7
}
fn default_language() -> String {
    "English".to_string()
}
fn default_site_name() -> String {
    "Quill".to_string()
}
fn default_site_url() -> String {
    "http://localhost".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl QuillConfig {
    /// Load config from a TOML file with QUILL_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `QUILL_SCHEDULER__SWEEP_INTERVAL_MINUTES=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: QuillConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("QUILL_").split("__"))
            .extract()
            .map_err(|e| crate::error::QuillError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.quill/quill.toml", home)
}
