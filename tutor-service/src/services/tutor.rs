//! Question answering: request assembly, provider call, reply extraction.

use super::metrics;
use super::providers::{ChatProvider, ProviderError};
use super::request_builder::{build_request, Prepared};
use super::response_extractor::extract_reply;
use super::retry::{with_retry, RetryPolicy};
use crate::config::{ChatConfig, TutorConfig};
use crate::models::{ChatReply, GroundingDataSource};
use std::sync::Arc;
use std::time::Instant;

/// Stateless question-answering service.
///
/// Everything it holds is read-only and shared between requests.
#[derive(Clone)]
pub struct TutorService {
    provider: Arc<dyn ChatProvider>,
    chat: Arc<ChatConfig>,
    grounding: Arc<GroundingDataSource>,
    retry: RetryPolicy,
}

impl TutorService {
    pub fn new(provider: Arc<dyn ChatProvider>, config: &TutorConfig) -> Self {
        Self {
            provider,
            chat: Arc::new(config.chat.clone()),
            grounding: Arc::new(config.grounding()),
            retry: RetryPolicy::from(&config.provider),
        }
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Answer one question. Empty input gets the canned reply without a
    /// provider call.
    pub async fn answer(&self, message: Option<&str>) -> Result<ChatReply, ProviderError> {
        let request = match build_request(message, &self.chat, &self.grounding) {
            Prepared::Canned(reply) => {
                tracing::info!("Empty message, returning canned reply");
                metrics::record_answer("canned");
                return Ok(reply);
            }
            Prepared::Request(request) => request,
        };

        let provider_name = self.provider.name();
        tracing::info!(
            provider = provider_name,
            deployment = %request.deployment,
            index = %request.grounding.index_name,
            "Forwarding request to chat provider"
        );

        let start = Instant::now();
        let result = with_retry(&self.retry, "chat_completion", || {
            self.provider.complete(&request)
        })
        .await
        .and_then(|completion| {
            if let Some(usage) = &completion.usage {
                metrics::record_tokens(provider_name, usage.prompt_tokens, usage.completion_tokens);
            }
            extract_reply(completion)
        });
        metrics::record_provider_latency(provider_name, start.elapsed().as_secs_f64());

        match result {
            Ok(text) => {
                tracing::info!(
                    provider = provider_name,
                    reply_len = text.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Chat provider answered"
                );
                metrics::record_answer("answered");
                Ok(ChatReply { text })
            }
            Err(err) => {
                tracing::error!(
                    provider = provider_name,
                    error = %err,
                    "Chat provider request failed"
                );
                metrics::record_provider_error(provider_name, err.kind());
                metrics::record_answer("failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatCompletion, Role};
    use crate::services::providers::mock::{completion_with_text, MockChatProvider};
    use crate::services::request_builder::{EMPTY_INPUT_REPLY, SYSTEM_MESSAGE};
    use service_core::config as core_config;
    use std::collections::HashMap;

    fn config() -> TutorConfig {
        let vars = HashMap::from([
            ("AZURE_OPENAI_ENDPOINT", "https://tutor.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "chat-key"),
            ("AZURE_OPENAI_DEPLOYMENT", "itso-gpt"),
            ("AZURE_SEARCH_ENDPOINT", "https://tutor.search.windows.net"),
            ("AZURE_SEARCH_API_KEY", "search-key"),
            ("AZURE_SEARCH_INDEX", "itsospec-index"),
            ("TUTOR_PROVIDER_INITIAL_BACKOFF_MS", "1"),
        ]);
        TutorConfig::from_lookup(core_config::Config { port: 0 }, |key| {
            vars.get(key).map(|v| v.to_string())
        })
        .unwrap()
    }

    fn service(provider: Arc<MockChatProvider>) -> TutorService {
        TutorService::new(provider, &config())
    }

    #[tokio::test]
    async fn empty_input_never_calls_provider() {
        let provider = Arc::new(MockChatProvider::replying("unused"));
        let tutor = service(provider.clone());

        for input in [None, Some(""), Some("  \t")] {
            let reply = tutor.answer(input).await.unwrap();
            assert_eq!(reply.text, EMPTY_INPUT_REPLY);
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn answers_with_first_choice() {
        let provider = Arc::new(MockChatProvider::replying("An ITSO product is..."));
        let tutor = service(provider.clone());

        let reply = tutor.answer(Some("What is an ITSO product?")).await.unwrap();

        assert_eq!(reply.text, "An ITSO product is...");
        assert_eq!(provider.call_count(), 1);

        let sent = &provider.requests()[0];
        assert_eq!(sent.messages.len(), 2);
        assert_eq!(sent.messages[0].role, Role::System);
        assert_eq!(sent.messages[0].content, SYSTEM_MESSAGE);
        assert_eq!(sent.messages[1].content, "What is an ITSO product?");
        assert_eq!(sent.deployment, "itso-gpt");
        assert_eq!(sent.grounding.index_name, "itsospec-index");
    }

    #[tokio::test]
    async fn empty_choice_list_fails_without_retry() {
        let provider = Arc::new(MockChatProvider::returning(ChatCompletion::default()));
        let tutor = service(provider.clone());

        let err = tutor.answer(Some("hello")).await.unwrap_err();

        assert_eq!(err, ProviderError::NoChoices);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let provider = Arc::new(
            MockChatProvider::replying("second time lucky").with_script(vec![Err(
                ProviderError::Api {
                    status: 503,
                    message: "busy".to_string(),
                },
            )]),
        );
        let tutor = service(provider.clone());

        let reply = tutor.answer(Some("hello")).await.unwrap();

        assert_eq!(reply.text, "second time lucky");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn authentication_failures_are_not_retried() {
        let provider = Arc::new(
            MockChatProvider::returning(completion_with_text("never")).with_script(vec![Err(
                ProviderError::Unauthorized("invalid key".to_string()),
            )]),
        );
        let tutor = service(provider.clone());

        let err = tutor.answer(Some("hello")).await.unwrap_err();

        assert!(matches!(err, ProviderError::Unauthorized(_)));
        assert_eq!(provider.call_count(), 1);
    }
}
