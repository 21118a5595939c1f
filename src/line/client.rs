//! LINE Messaging API reply client.
//!
//! Renders the engine's platform-neutral replies into LINE message
//! objects and posts them to the reply endpoint.

use super::LineError;
use crate::config::{Config, Group};
use crate::engine::{vote_payload, Reply};
use async_trait::async_trait;
use reqwest::ClientBuilder;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";

// LINE template field limits.
const MAX_COLUMN_TITLE: usize = 40;
const MAX_COLUMN_TEXT: usize = 60;

/// Seam for sending replies, so the server can run against a recording
/// fake in tests.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send the replies for one event. An empty list sends nothing.
    async fn send_reply(&self, reply_token: &str, replies: &[Reply]) -> Result<(), LineError>;
}

/// Reply client backed by the Messaging API.
pub struct LineClient {
    config: Arc<Config>,
    http: reqwest::Client,
    endpoint: String,
}

impl LineClient {
    pub fn new(config: Arc<Config>) -> Result<Self, LineError> {
        if config.line.channel_access_token.is_empty() {
            return Err(LineError::InvalidConfig(
                "channel access token is not set".to_string(),
            ));
        }
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            config,
            http,
            endpoint: REPLY_ENDPOINT.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests).
    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn send_reply(&self, reply_token: &str, replies: &[Reply]) -> Result<(), LineError> {
        if replies.is_empty() {
            return Ok(());
        }

        let messages: Vec<Value> = replies
            .iter()
            .map(|reply| render_message(&self.config, reply))
            .collect();
        let body = json!({
            "replyToken": reply_token,
            "messages": messages,
        });

        debug!(count = replies.len(), "sending reply messages");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.line.channel_access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LineError::Api(format!("{status}: {detail}")));
        }
        Ok(())
    }
}

/// Render one reply into a LINE message object.
pub fn render_message(config: &Config, reply: &Reply) -> Value {
    match reply {
        Reply::Text(text) => json!({
            "type": "text",
            "text": text,
        }),
        Reply::Image { url } => json!({
            "type": "image",
            "originalContentUrl": url,
            "previewImageUrl": url,
        }),
        Reply::Carousel(group) => render_carousel(config, *group),
    }
}

fn render_carousel(config: &Config, group: Group) -> Value {
    let columns: Vec<Value> = config
        .group_candidates(group)
        .map(|candidate| {
            json!({
                "thumbnailImageUrl": candidate.image_url,
                "title": truncate(&candidate.name, MAX_COLUMN_TITLE),
                "text": truncate(&candidate.description, MAX_COLUMN_TEXT),
                "actions": [{
                    "type": "postback",
                    "label": "Vote",
                    "data": vote_payload(&candidate.id),
                    "displayText": format!("I vote for {}", candidate.name),
                }],
            })
        })
        .collect();

    json!({
        "type": "template",
        "altText": format!("Group {} candidates", group.label()),
        "template": {
            "type": "carousel",
            "columns": columns,
        },
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
