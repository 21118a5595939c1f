//! LINE webhook event types and signature verification.

use crate::engine::EventKind;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the `X-Line-Signature` header: base64 of the HMAC-SHA256 of
/// the raw request body, keyed with the channel secret.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let Ok(expected) = BASE64_STANDARD.decode(signature) else {
        return false;
    };
    mac.verify_slice(&expected).is_ok()
}

/// The webhook request body: a batch of events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// Bot user id the events were sent to.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Event type ("message", "postback", "follow", ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Token for the reply API; absent on events that cannot be replied to.
    #[serde(default)]
    pub reply_token: Option<String>,
    /// Event timestamp (Unix ms).
    #[serde(default)]
    pub timestamp: i64,
    /// Who sent the event.
    #[serde(default)]
    pub source: Option<EventSource>,
    /// Message body, for message events.
    #[serde(default)]
    pub message: Option<MessagePayload>,
    /// Postback body, for postback events.
    #[serde(default)]
    pub postback: Option<PostbackPayload>,
}

/// Event source: 1:1 chat, group, or room.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum EventSource {
    #[serde(rename = "user", rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename = "group", rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename = "room", rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl EventSource {
    /// The sending user's id, when the platform provided one.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            EventSource::User { user_id } => Some(user_id),
            EventSource::Group { user_id, .. } | EventSource::Room { user_id, .. } => {
                user_id.as_deref()
            }
        }
    }
}

/// Message payload of a message event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Postback payload of a postback event.
#[derive(Debug, Clone, Deserialize)]
pub struct PostbackPayload {
    pub data: String,
}

impl WebhookEvent {
    /// Reduce the event to what the engine consumes. `None` for events
    /// without a reply token or user id, and for message types other
    /// than text.
    pub fn to_inbound(&self) -> Option<(String, EventKind, String)> {
        let reply_token = self.reply_token.clone()?;
        let user_id = self.source.as_ref()?.user_id()?.to_string();
        let kind = match self.event_type.as_str() {
            "message" => {
                let message = self.message.as_ref()?;
                if message.message_type != "text" {
                    return None;
                }
                EventKind::Text(message.text.clone()?)
            }
            "postback" => EventKind::Postback(self.postback.as_ref()?.data.clone()),
            _ => return None,
        };
        Some((user_id, kind, reply_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        BASE64_STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_verification() {
        let body = br#"{"events":[]}"#;
        let signature = sign("secret", body);

        assert!(verify_signature("secret", body, &signature));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("secret", b"tampered", &signature));
        assert!(!verify_signature("secret", body, "not base64 !!!"));
        assert!(!verify_signature("secret", body, ""));
    }

    #[test]
    fn test_parse_text_message_event() {
        let body = r#"{
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "replyToken": "token-1",
                "timestamp": 1751328000000,
                "source": {"type": "user", "userId": "U1234"},
                "message": {"id": "m1", "type": "text", "text": "vote"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.events.len(), 1);
        let (user_id, kind, reply_token) = envelope.events[0].to_inbound().unwrap();
        assert_eq!(user_id, "U1234");
        assert_eq!(kind, EventKind::Text("vote".to_string()));
        assert_eq!(reply_token, "token-1");
    }

    #[test]
    fn test_parse_postback_event() {
        let body = r#"{
            "events": [{
                "type": "postback",
                "replyToken": "token-2",
                "source": {"type": "user", "userId": "U1234"},
                "postback": {"data": "action=vote&candidateId=1"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        let (_, kind, _) = envelope.events[0].to_inbound().unwrap();
        assert_eq!(
            kind,
            EventKind::Postback("action=vote&candidateId=1".to_string())
        );
    }

    #[test]
    fn test_non_text_message_skipped() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-3",
                "source": {"type": "user", "userId": "U1234"},
                "message": {"id": "m2", "type": "sticker"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.events[0].to_inbound().is_none());
    }

    #[test]
    fn test_event_without_reply_token_skipped() {
        let body = r#"{
            "events": [{
                "type": "unfollow",
                "source": {"type": "user", "userId": "U1234"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.events[0].to_inbound().is_none());
    }

    #[test]
    fn test_group_source_uses_sender_id() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-4",
                "source": {"type": "group", "groupId": "G1", "userId": "U5678"},
                "message": {"id": "m3", "type": "text", "text": "tally"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        let (user_id, _, _) = envelope.events[0].to_inbound().unwrap();
        assert_eq!(user_id, "U5678");
    }

    #[test]
    fn test_unknown_event_type_skipped() {
        let body = r#"{
            "events": [{
                "type": "beacon",
                "replyToken": "token-5",
                "source": {"type": "user", "userId": "U1234"}
            }]
        }"#;

        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.events[0].to_inbound().is_none());
    }
}
