//! Realtime event definitions
//!
//! Events are pushed to socket rooms (per user, per conversation, or the
//! broadcast room) and serialized as JSON with a `type` tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::Tier;

/// Chat message as delivered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Notification as delivered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Events pushed over the socket side-channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A message was posted to a conversation
    MessageCreated { message: MessagePayload },

    /// A member read a conversation up to `read_at`
    ConversationRead {
        conversation_id: String,
        user_id: String,
        read_at: DateTime<Utc>,
    },

    /// A member is typing
    Typing {
        conversation_id: String,
        user_id: String,
    },

    /// New notification for the receiving user (or everyone, via broadcast)
    Notification { notification: NotificationPayload },

    /// The receiving user's effective tier changed
    SubscriptionChanged { tier: Tier, expires_at: Option<DateTime<Utc>> },

    /// Acknowledges a join request
    Joined { conversation_id: String },

    /// Acknowledges a leave request
    Left { conversation_id: String },

    /// Reply to a client ping
    Pong,

    /// A client frame could not be processed
    Error { message: String },
}

impl RealtimeEvent {
    /// Event type string, matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            RealtimeEvent::MessageCreated { .. } => "message_created",
            RealtimeEvent::ConversationRead { .. } => "conversation_read",
            RealtimeEvent::Typing { .. } => "typing",
            RealtimeEvent::Notification { .. } => "notification",
            RealtimeEvent::SubscriptionChanged { .. } => "subscription_changed",
            RealtimeEvent::Joined { .. } => "joined",
            RealtimeEvent::Left { .. } => "left",
            RealtimeEvent::Pong => "pong",
            RealtimeEvent::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        RealtimeEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_matches_tag() {
        let events = vec![
            RealtimeEvent::Pong,
            RealtimeEvent::error("bad frame"),
            RealtimeEvent::Typing {
                conversation_id: "c".into(),
                user_id: "u".into(),
            },
            RealtimeEvent::SubscriptionChanged {
                tier: Tier::Premium,
                expires_at: None,
            },
        ];

        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn test_message_created_shape() {
        let event = RealtimeEvent::MessageCreated {
            message: MessagePayload {
                id: "m1".into(),
                conversation_id: "c1".into(),
                sender_id: "u1".into(),
                sender_name: "Ana".into(),
                body: "Salut".into(),
                created_at: Utc::now(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_created");
        assert_eq!(json["message"]["body"], "Salut");
    }
}
