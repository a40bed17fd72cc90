//! Domain models for the tutor service.

pub mod chat;

pub use chat::{
    AskRequest, ChatCompletion, ChatMessage, ChatReply, ChatRequest, Choice, FinishReason,
    GroundingDataSource, ReplyMessage, Role, TokenUsage,
};
