//! Azure OpenAI provider implementation.
//!
//! Sends chat completions to a deployment with an Azure AI Search index
//! attached as `data_sources`, so the model answers from retrieved documents.

use super::{ChatProvider, ProviderError};
use crate::config::ChatConfig;
use crate::models::{ChatCompletion, ChatMessage, ChatRequest};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Azure OpenAI chat provider.
pub struct AzureOpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: Secret<String>,
    api_version: String,
}

impl AzureOpenAiProvider {
    /// Create a provider whose calls fail with [`ProviderError::Timeout`]
    /// after `timeout`.
    pub fn new(config: &ChatConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    /// Build the chat-completions URL for a deployment.
    fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        )
    }

    fn models_url(&self) -> String {
        format!(
            "{}/openai/models?api-version={}",
            self.endpoint, self.api_version
        )
    }

    fn build_body<'a>(&self, request: &'a ChatRequest) -> ChatCompletionsBody<'a> {
        let grounding = &request.grounding;

        ChatCompletionsBody {
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            data_sources: vec![DataSource {
                kind: "azure_search",
                parameters: AzureSearchParameters {
                    endpoint: &grounding.search_endpoint,
                    index_name: &grounding.index_name,
                    authentication: Authentication {
                        kind: "api_key",
                        key: grounding.api_key.expose_secret(),
                    },
                },
            }],
        }
    }
}

#[async_trait]
impl ChatProvider for AzureOpenAiProvider {
    fn name(&self) -> &'static str {
        "azure-openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let url = self.completions_url(&request.deployment);
        let body = self.build_body(request);

        tracing::debug!(
            deployment = %request.deployment,
            index = %request.grounding.index_name,
            message_count = request.messages.len(),
            "Sending request to Azure OpenAI"
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &error_text, retry_after));
        }

        let text = response.text().await.map_err(map_transport_error)?;

        serde_json::from_str::<ChatCompletion>(&text)
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {}", e)))
    }

    /// Lists the resource's models to prove the endpoint is reachable and
    /// the key is accepted. No tokens are spent.
    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.models_url())
            .header("api-key", self.api_key.expose_secret())
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = retry_after(response.headers());
        let error_text = response.text().await.unwrap_or_default();
        Err(map_status_error(status, &error_text, retry_after))
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> ProviderError {
    let message = extract_error_message(body);

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidRequest(message)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull `error.message` out of an Azure error body, falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Azure sends `retry-after-ms` alongside the standard `retry-after` seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    header_u64("retry-after-ms")
        .map(Duration::from_millis)
        .or_else(|| header_u64("retry-after").map(Duration::from_secs))
}

// ============================================================================
// Azure OpenAI Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionsBody<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    data_sources: Vec<DataSource<'a>>,
}

#[derive(Debug, Serialize)]
struct DataSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    parameters: AzureSearchParameters<'a>,
}

#[derive(Debug, Serialize)]
struct AzureSearchParameters<'a> {
    endpoint: &'a str,
    index_name: &'a str,
    authentication: Authentication<'a>,
}

#[derive(Debug, Serialize)]
struct Authentication<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    key: &'a str,
}
