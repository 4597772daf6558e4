use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_MODEL: &str = "anthropic/claude-3-haiku";
const DEFAULT_API_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAX_TOKENS: u32 = 2000;
const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;

const JSON_ONLY_INSTRUCTION: &str = "\nAnswer only with valid JSON, no markdown.";
const PARSE_FAILURE: &str = "Failed to parse JSON";

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("LLM not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyChoices,
}

/// Model output after the JSON-only round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput {
    Parsed(Map<String, Value>),
    Raw { raw_response: String, error: String },
}

impl StructuredOutput {
    /// Field of a parsed object; `None` for raw output or a missing key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Parsed(map) => map.get(key).filter(|v| !v.is_null()),
            Self::Raw { .. } => None,
        }
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.field(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.field(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Parsed(map) => Value::Object(map),
            Self::Raw { raw_response, error } => serde_json::json!({
                "raw_response": raw_response,
                "error": error,
            }),
        }
    }
}

/// Strip a surrounding markdown fence (and a `json` language tag) from a reply.
pub fn strip_markdown_fence(response: &str) -> &str {
    let cleaned = response.trim();
    let Some(after_open) = cleaned.strip_prefix("```") else {
        return cleaned;
    };
    let body = after_open.split("```").next().unwrap_or(after_open);
    body.strip_prefix("json").unwrap_or(body).trim()
}

pub fn parse_structured(response: &str) -> StructuredOutput {
    match serde_json::from_str::<Value>(strip_markdown_fence(response)) {
        Ok(Value::Object(map)) => StructuredOutput::Parsed(map),
        _ => StructuredOutput::Raw {
            raw_response: response.to_string(),
            error: PARSE_FAILURE.to_string(),
        },
    }
}

/// Text generation capability handed to the task generator.
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    fn is_available(&self) -> bool;

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: f32,
    ) -> BoxFuture<'a, Result<String, LLMError>>;

    fn generate_structured<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: f32,
    ) -> BoxFuture<'a, Result<StructuredOutput, LLMError>> {
        Box::pin(async move {
            let system = format!("{}{}", system.unwrap_or_default(), JSON_ONLY_INSTRUCTION);
            let raw = self.generate(prompt, Some(&system), temperature).await?;
            Ok(parse_structured(&raw))
        })
    }
}

#[derive(Clone)]
pub struct LLMProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LLMProvider {
    pub fn from_env() -> Self {
        let api_key = env_string("LLM_API_KEY");
        let model = env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_endpoint = normalize_endpoint(
            env_string("LLM_API_ENDPOINT").unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        Self::new(LLMConfig {
            api_key,
            model,
            api_endpoint,
            timeout,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn new(config: LLMConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client }
    }

    pub async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<ChatResponse, LLMError> {
        let api_key = self.config.api_key.as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(LLMError::NotConfigured("LLM_API_KEY"))?;

        let url = format!("{}/chat/completions", self.config.api_endpoint.trim_end_matches('/'));
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false
        });

        self.post_with_retry(&url, api_key, &payload).await
    }

    async fn complete(&self, prompt: &str, system: Option<&str>, temperature: f32) -> Result<String, LLMError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage { role: "system".into(), content: system.into() });
        }
        messages.push(ChatMessage { role: "user".into(), content: prompt.into() });

        let response = self.chat(&messages, temperature).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = response.model.as_deref().unwrap_or(&self.config.model),
                total_tokens = usage.total_tokens,
                "LLM completion finished"
            );
        }
        response.first_content().map(|s| s.to_string()).ok_or(LLMError::EmptyChoices)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, LLMError> {
        let mut last_error: Option<LLMError> = None;

        for retry in 0..=MAX_RETRIES {
            match self.client.post(url).bearer_auth(api_key).json(payload).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return serde_json::from_slice(&bytes).map_err(|e| {
                            tracing::error!(error = %e, "failed to parse LLM response body");
                            LLMError::Json(e)
                        });
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = LLMError::HttpStatus { status, body };
                    if retry < MAX_RETRIES && is_retryable(status) {
                        warn!(retry, ?status, "LLM request failed, retrying");
                        sleep(backoff(retry)).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = LLMError::Request(e);
                    if retry < MAX_RETRIES {
                        warn!(retry, error = %err, "LLM request error, retrying");
                        sleep(backoff(retry)).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(LLMError::NotConfigured("unknown")))
    }
}

impl TextGenerator for LLMProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
            && !self.config.api_endpoint.trim().is_empty()
    }

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: f32,
    ) -> BoxFuture<'a, Result<String, LLMError>> {
        Box::pin(self.complete(prompt, system, temperature))
    }
}

fn backoff(retry: usize) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS * (1 << retry))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen_system: Mutex<Option<String>>,
    }

    impl TextGenerator for Canned {
        fn model(&self) -> &str {
            "canned"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn generate<'a>(
            &'a self,
            _prompt: &'a str,
            system: Option<&'a str>,
            _temperature: f32,
        ) -> BoxFuture<'a, Result<String, LLMError>> {
            *self.seen_system.lock().unwrap() = system.map(str::to_string);
            Box::pin(async move { Ok(self.reply.clone()) })
        }
    }

    #[test]
    fn test_strip_fence_with_language_tag() {
        let reply = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_markdown_fence(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_passthrough() {
        assert_eq!(strip_markdown_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_markdown_fence("```\n{}\n```"), "{}");
    }

    #[test]
    fn test_parse_failure_keeps_raw() {
        let out = parse_structured("sorry, no JSON today");
        assert_eq!(
            out,
            StructuredOutput::Raw {
                raw_response: "sorry, no JSON today".into(),
                error: "Failed to parse JSON".into(),
            }
        );
        assert_eq!(out.into_value()["error"], "Failed to parse JSON");
    }

    #[test]
    fn test_non_object_json_is_raw() {
        assert!(!parse_structured("[1, 2, 3]").is_parsed());
    }

    #[test]
    fn test_field_helpers() {
        let out = parse_structured(r#"{"title": "Fractions", "hints": ["one", 2], "tip": null}"#);
        assert_eq!(out.str_or("title", "x"), "Fractions");
        assert_eq!(out.str_or("tip", "none"), "none");
        assert_eq!(out.string_list("hints"), vec!["one", "2"]);
        assert!(out.string_list("missing").is_empty());
    }

    #[tokio::test]
    async fn test_structured_appends_json_instruction() {
        let generator = Canned {
            reply: "```json\n{\"ok\": true}\n```".into(),
            seen_system: Mutex::new(None),
        };
        let out = generator
            .generate_structured("prompt", Some("base"), 0.5)
            .await
            .unwrap();
        assert_eq!(out.field("ok"), Some(&Value::Bool(true)));
        let system = generator.seen_system.lock().unwrap().clone().unwrap();
        assert_eq!(system, "base\nAnswer only with valid JSON, no markdown.");
    }

    #[test]
    fn test_unconfigured_provider_is_unavailable() {
        let provider = LLMProvider::new(LLMConfig {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            api_endpoint: DEFAULT_API_ENDPOINT.into(),
            timeout: Duration::from_secs(1),
            max_tokens: DEFAULT_MAX_TOKENS,
        });
        assert!(!provider.is_available());
        assert_eq!(provider.model(), "anthropic/claude-3-haiku");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("https://openrouter.ai/api/v1/".into()), "https://openrouter.ai/api/v1");
        assert_eq!(normalize_endpoint("http://localhost:8080".into()), "http://localhost:8080/v1");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(reqwest::StatusCode::UNAUTHORIZED));
    }
}
