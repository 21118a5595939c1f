//! LINE Messaging API integration
//!
//! Webhook event types, signature verification, and the outbound reply
//! client.

pub mod client;
pub mod webhook;

pub use client::{LineClient, ReplySender};
pub use webhook::{verify_signature, WebhookEnvelope, WebhookEvent};

/// LINE errors
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
