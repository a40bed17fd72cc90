//! Chat-completion provider abstractions and implementations.
//!
//! The tutor only depends on [`ChatProvider`]; the Azure OpenAI backend and
//! the in-memory mock are interchangeable behind it.

pub mod azure_openai;
pub mod mock;

use crate::models::{ChatCompletion, ChatRequest};
use async_trait::async_trait;
use service_core::error::AppError;
use std::time::Duration;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider call timed out")]
    Timeout,

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider returned no choices")]
    NoChoices,

    #[error("Provider returned a choice without message content")]
    MissingContent,

    #[error("Content filtered")]
    ContentFiltered,
}

impl ProviderError {
    /// Whether another attempt may succeed without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout
            | ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Timeout => "timeout",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Unauthorized(_) => "unauthorized",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::Api { .. } => "api",
            ProviderError::MalformedResponse(_) => "malformed_response",
            ProviderError::NoChoices => "no_choices",
            ProviderError::MissingContent => "missing_content",
            ProviderError::ContentFiltered => "content_filtered",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout => AppError::GatewayTimeout(err.to_string()),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Trait for grounded chat-completion providers (e.g., Azure OpenAI).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Submit one chat-completion request.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError>;

    /// Cheap local readiness check; must not spend a model call.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
