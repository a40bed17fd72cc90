//! HTTP handlers for the tutor service.

pub mod ask;
pub mod health;
