//! Mock provider implementation for testing.

use super::{ChatProvider, ProviderError};
use crate::models::{ChatCompletion, ChatRequest, Choice, FinishReason, ReplyMessage, Role};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock chat provider that counts calls and records every request it sees.
///
/// Scripted results are served first, in order; afterwards every call gets
/// the fallback completion.
pub struct MockChatProvider {
    fallback: ChatCompletion,
    scripted: Mutex<VecDeque<Result<ChatCompletion, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    health: Result<(), ProviderError>,
}

impl MockChatProvider {
    /// Always answer with a single choice carrying `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::returning(completion_with_text(text))
    }

    /// Always answer with `completion`.
    pub fn returning(completion: ChatCompletion) -> Self {
        Self {
            fallback: completion,
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            health: Ok(()),
        }
    }

    /// Serve `results` first, then fall back to `self`'s completion.
    pub fn with_script(self, results: Vec<Result<ChatCompletion, ProviderError>>) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(results);
        }
        self
    }

    /// Report `error` from every readiness check.
    pub fn unhealthy(mut self, error: ProviderError) -> Self {
        self.health = Err(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

/// A completion with exactly one assistant choice.
pub fn completion_with_text(text: impl Into<String>) -> ChatCompletion {
    ChatCompletion {
        choices: vec![Choice {
            index: 0,
            message: Some(ReplyMessage {
                role: Some(Role::Assistant),
                content: Some(text.into()),
            }),
            finish_reason: Some(FinishReason::Stop),
        }],
        usage: None,
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.pop_front());

        match scripted {
            Some(result) => result,
            None => Ok(self.fallback.clone()),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.health.clone()
    }
}
