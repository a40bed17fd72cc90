//! The question endpoint.

use crate::models::{AskRequest, ChatReply};
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, Uri},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;

/// Query string accepted on GET when the body carries no message.
#[derive(Debug, Default, Deserialize)]
pub struct AskQuery {
    pub message: Option<String>,
}

/// Answer a question.
///
/// Accepts `{"message": "..."}` on GET or POST. A missing body, a JSON
/// `null`, or a missing `message` field all mean "no message" and get the
/// canned reply with `200`. On GET only, `?message=` fills in for a body
/// without one.
pub async fn ask(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Json<ChatReply>, AppError> {
    let mut message = decode_ask_body(&body)?.message;
    if message.is_none() && method == Method::GET {
        message = query_message(&uri)?;
    }

    tracing::info!(
        method = %method,
        message_len = message.as_deref().map(str::len).unwrap_or(0),
        "Received tutor question"
    );

    let reply = state.tutor.answer(message.as_deref()).await?;

    Ok(Json(reply))
}

/// The `message` query parameter, if any.
pub fn query_message(uri: &Uri) -> Result<Option<String>, AppError> {
    let Query(query) = Query::<AskQuery>::try_from_uri(uri).map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Invalid query string: {}", e))
    })?;

    Ok(query.message)
}

/// Typed decode of the request body.
pub fn decode_ask_body(body: &[u8]) -> Result<AskRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AskRequest::default());
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Request body is not valid JSON: {}", e))
    })?;

    match value {
        Value::Null => Ok(AskRequest::default()),
        Value::Object(_) => serde_json::from_value(value).map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Invalid request body: {}", e))
        }),
        _ => Err(AppError::BadRequest(anyhow::anyhow!(
            "Request body must be a JSON object"
        ))),
    }
}
