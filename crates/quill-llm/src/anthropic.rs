use std::time::Duration;

use async_trait::async_trait;
use quill_core::config::AnthropicConfig;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{Completion, CompletionError, CompletionRequest, CompletionService};

const API_VERSION: &str = "2023-06-01";
const OAUTH_BETA: &str = "oauth-2025-04-20";
const OAUTH_TOKEN_PREFIX: &str = "sk-ant-oat01-";

/// Anthropic Messages API client, non-streaming.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    is_oauth: bool,
}

impl AnthropicClient {
    pub fn new(config: &AnthropicConfig, model: &str) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            is_oauth: config.api_key.starts_with(OAUTH_TOKEN_PREFIX),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// OAuth tokens use Bearer + beta header, plain API keys use x-api-key.
    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.is_oauth {
            builder
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("anthropic-beta", OAUTH_BETA)
        } else {
            builder.header("x-api-key", &self.api_key)
        }
    }
}

#[async_trait]
impl CompletionService for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, CompletionError> {
        let body = build_request_body(&self.model, req);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, max_tokens = req.max_tokens, "sending completion request");

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let resp = self.apply_auth(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Http(e)
            }
        })?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(CompletionError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
            return Err(CompletionError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        parse_response(api_resp)
    }
}

fn build_request_body(model: &str, req: &CompletionRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
        "messages": [{ "role": "user", "content": req.prompt }],
        "stream": false,
    });
    if let Some(ref system) = req.system_prompt {
        body["system"] = serde_json::Value::String(system.clone());
    }
    body
}

fn parse_response(resp: ApiResponse) -> Result<Completion, CompletionError> {
    let text: String = resp
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Unknown => None,
        })
        .collect();

    if text.is_empty() {
        return Err(CompletionError::Parse(
            "response contained no text blocks".to_string(),
        ));
    }

    Ok(Completion {
        text,
        tokens_used: resp.usage.input_tokens + resp.usage.output_tokens,
    })
}

// Anthropic API response types (deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_system_and_temperature() {
        let req = CompletionRequest::new("Write a post", 4000, 0.7).with_system("You are Ada");
        let body = build_request_body("claude-test", &req);
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["system"], "You are Ada");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Write a post");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn body_omits_system_when_absent() {
        let req = CompletionRequest::new("hi", 10, 0.0);
        let body = build_request_body("claude-test", &req);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn tokens_used_sums_input_and_output() {
        let raw = r#"{
            "id": "msg_1",
            "model": "claude-test",
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 120, "output_tokens": 880}
        }"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let completion = parse_response(resp).unwrap();
        assert_eq!(completion.text, "Hello world");
        assert_eq!(completion.tokens_used, 1000);
    }

    #[test]
    fn empty_response_is_a_parse_error() {
        let raw = r#"{"content": [], "usage": {"input_tokens": 1, "output_tokens": 0}}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(parse_response(resp), Err(CompletionError::Parse(_))));
    }

    #[test]
    fn oauth_tokens_are_detected() {
        let cfg = AnthropicConfig {
            api_key: "sk-ant-oat01-abc".into(),
            base_url: "https://api.anthropic.com/".into(),
            timeout_secs: 30,
        };
        let client = AnthropicClient::new(&cfg, "claude-test").unwrap();
        assert!(client.is_oauth);
        assert_eq!(client.base_url, "https://api.anthropic.com");
    }
}
