// Azure OpenAI-specific client implementation

use crate::openai::{build_chat_payload, parse_completion, WireCompletion};
use crate::traits::{ChatClient, ChatRequest, ChatResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Azure OpenAI client (HTTP direct, no SDK)
///
/// - URL: https://{resource}.openai.azure.com/openai/deployments/{deployment}/...
/// - Auth header: api-key instead of Authorization: Bearer
/// - Deployment name is passed via the model parameter in each request
#[derive(Debug)]
pub struct AzureOpenAIClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_version: String,
}

impl AzureOpenAIClient {
    pub fn builder() -> AzureOpenAIClientBuilder {
        AzureOpenAIClientBuilder::default()
    }

    fn build_url(&self, deployment_name: &str, path: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment_name, path, self.api_version
        )
    }
}

/// Builder for AzureOpenAIClient
#[derive(Default)]
pub struct AzureOpenAIClientBuilder {
    api_key: Option<String>,
    endpoint: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
}

impl AzureOpenAIClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Example: "https://my-resource.openai.azure.com"
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<AzureOpenAIClient> {
        let api_key = self.api_key.context("API key is required")?;
        let endpoint = self.endpoint.context("Endpoint is required")?;
        let api_version = self.api_version.context("API version is required")?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            )
            .build()
            .context("Failed to create HTTP client")?;

        Ok(AzureOpenAIClient {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version,
        })
    }
}

#[async_trait]
impl ChatClient for AzureOpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "sending chat completion");
        let url = self.build_url(&request.model, "chat/completions");
        let payload = build_chat_payload(&request.model, false, &request.messages, &request.options);

        let response = self
            .http_client
            .post(url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Azure OpenAI API error ({}): {}", status, error_text);
        }

        let raw: WireCompletion = response
            .json()
            .await
            .context("Failed to parse response")?;

        Ok(parse_completion(raw))
    }

    fn provider(&self) -> &str {
        "azure_openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_fields() {
        let err = AzureOpenAIClient::builder()
            .endpoint("https://x.openai.azure.com")
            .api_version("2024-02-15-preview")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("API key"));

        let err = AzureOpenAIClient::builder()
            .api_key("k")
            .api_version("2024-02-15-preview")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Endpoint"));

        let err = AzureOpenAIClient::builder()
            .api_key("k")
            .endpoint("https://x.openai.azure.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("API version"));
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let client = AzureOpenAIClient::builder()
            .api_key("k")
            .endpoint("https://x.openai.azure.com/")
            .api_version("2024-02-15-preview")
            .build()
            .unwrap();

        assert_eq!(
            client.build_url("gpt-4o", "chat/completions"),
            "https://x.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }
}
