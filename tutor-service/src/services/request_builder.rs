//! Turns an inbound question into a grounded chat-completion request.

use crate::config::ChatConfig;
use crate::models::{ChatMessage, ChatReply, ChatRequest, GroundingDataSource};
use std::sync::Arc;

/// Persona and grounding rules sent as the first turn of every request.
pub const SYSTEM_MESSAGE: &str = "You are ITSO Tutor, an assistant that helps people understand the \
ITSO smart ticketing specification. Answer only from the retrieved documents provided as context. \
If the retrieved documents do not contain the information needed to answer, say that the \
information is not available instead of guessing.";

/// Reply for empty input; no provider call is made for it.
pub const EMPTY_INPUT_REPLY: &str = "I'm sorry, I didn't understand that. Could you please repeat?";

pub const MAX_TOKENS: u32 = 600;
pub const TEMPERATURE: f32 = 0.9;

/// Outcome of request assembly.
#[derive(Debug, Clone)]
pub enum Prepared {
    /// Answer directly without calling the provider.
    Canned(ChatReply),
    /// Submit to the provider.
    Request(ChatRequest),
}

/// Build the request for `user_message`.
///
/// `None`, empty and whitespace-only messages short-circuit to
/// [`EMPTY_INPUT_REPLY`]. Any other message is passed through verbatim.
pub fn build_request(
    user_message: Option<&str>,
    chat: &ChatConfig,
    grounding: &Arc<GroundingDataSource>,
) -> Prepared {
    let message = match user_message {
        Some(m) if !m.trim().is_empty() => m,
        _ => return Prepared::Canned(ChatReply::new(EMPTY_INPUT_REPLY)),
    };

    Prepared::Request(ChatRequest {
        deployment: chat.deployment.clone(),
        messages: vec![ChatMessage::system(SYSTEM_MESSAGE), ChatMessage::user(message)],
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
        grounding: Arc::clone(grounding),
    })
}
