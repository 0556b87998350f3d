use async_trait::async_trait;

/// One text completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens,
            temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }
}

/// Completion result. `tokens_used` is input plus output tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CompletionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Request timed out")]
    Timeout,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl CompletionError {
    /// Network failures, timeouts, throttling and server errors may succeed
    /// on a later attempt. Client errors and unparseable responses will not.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http(e) => !e.is_builder() && !e.is_decode(),
            CompletionError::Api { status, .. } => *status >= 500 || *status == 408,
            CompletionError::Parse(_) => false,
            CompletionError::RateLimited { .. }
            | CompletionError::Timeout
            | CompletionError::Unavailable(_) => true,
        }
    }
}
