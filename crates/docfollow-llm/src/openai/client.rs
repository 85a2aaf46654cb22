// OpenAI-specific client implementation

use crate::traits::{
    is_reasoning_model, ChatClient, ChatOptions, ChatRequest, ChatResponse, ResponseFormat,
    TokenUsage,
};
use crate::types::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_API_BASE, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create client against a custom base URL (proxies, compatible servers, tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "sending chat completion");
        let payload = build_chat_payload(&request.model, true, &request.messages, &request.options);

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let raw: WireCompletion = response
            .json()
            .await
            .context("Failed to parse response")?;

        Ok(parse_completion(raw))
    }

    fn provider(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// WIRE FORMAT (shared with Azure, which speaks the same chat/completions body)
// ============================================================================

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

/// Build a chat/completions body. Azure sets `include_model = false` because
/// the deployment is part of its URL.
pub(crate) fn build_chat_payload<'a>(
    model: &'a str,
    include_model: bool,
    messages: &'a [Message],
    options: &ChatOptions,
) -> ChatPayload<'a> {
    let reasoning = is_reasoning_model(model);

    ChatPayload {
        model: include_model.then_some(model),
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role(),
                content: m.content().to_text(),
            })
            .collect(),
        temperature: options.temperature.filter(|_| !reasoning),
        max_tokens: options.max_tokens.filter(|_| !reasoning),
        max_completion_tokens: options.max_tokens.filter(|_| reasoning),
        response_format: match options.response_format {
            ResponseFormat::Text => None,
            ResponseFormat::JsonObject => Some(WireResponseFormat { kind: "json_object" }),
        },
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

pub(crate) fn parse_completion(raw: WireCompletion) -> ChatResponse {
    let choice = raw.choices.into_iter().next();
    ChatResponse {
        content: choice.as_ref().and_then(|c| c.message.content.clone()),
        finish_reason: choice.and_then(|c| c.finish_reason),
        usage: raw.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_for_chat_model() {
        let messages = vec![Message::system("be brief"), Message::human("hi")];
        let options = ChatOptions::new().temperature(0.2).max_tokens(100).json();
        let payload = serde_json::to_value(build_chat_payload("gpt-4o", true, &messages, &options)).unwrap();

        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "hi");
        assert_eq!(payload["max_tokens"], 100);
        assert_eq!(payload["response_format"]["type"], "json_object");
        assert!(payload.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_payload_for_reasoning_model() {
        let messages = vec![Message::human("hi")];
        let options = ChatOptions::new().temperature(0.2).max_tokens(100);
        let payload = serde_json::to_value(build_chat_payload("gpt-5-mini", true, &messages, &options)).unwrap();

        assert!(payload.get("temperature").is_none());
        assert!(payload.get("max_tokens").is_none());
        assert_eq!(payload["max_completion_tokens"], 100);
        assert!(payload.get("response_format").is_none());
    }
}
