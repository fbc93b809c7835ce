//! Core types: chats and messages as reported by the WhatsApp transport.
//!
//! The transport speaks camelCase JSON (`unreadCount`, `fromMe`, ...); these
//! types carry `#[serde(rename_all = "camelCase")]` so the same structs are
//! used on the bridge wire and in HTTP responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::truncate_chars;

// ─────────────────────────────────────────────
// Session status
// ─────────────────────────────────────────────

/// Snapshot of the session flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub connected: bool,
    pub initializing: bool,
}

/// Lifecycle phase of the session, derived from its flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No handle, no connect attempt in flight.
    Disconnected,
    /// Connect attempt started, no pairing code seen yet.
    Initializing,
    /// A pairing code is waiting to be scanned.
    WaitingPairing,
    /// Transport reported ready.
    Connected,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Initializing => write!(f, "initializing"),
            Self::WaitingPairing => write!(f, "waiting_pairing"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

// ─────────────────────────────────────────────
// Chats
// ─────────────────────────────────────────────

/// A chat as reported by the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Transport chat id (e.g. `5548999999999@c.us`, `1203630@g.us`).
    pub id: String,
    /// Display name (contact name, push name or group subject).
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub unread_count: u32,
    /// Body of the most recent message, if any.
    #[serde(default)]
    pub last_message: Option<String>,
}

/// Listing form of a chat, with the last message cut to a preview.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
    pub unread_count: u32,
    pub last_message: Option<String>,
}

impl ChatSummary {
    /// Summarize a chat, keeping at most `preview_chars` characters of the last message.
    pub fn from_chat(chat: Chat, preview_chars: usize) -> Self {
        ChatSummary {
            last_message: chat
                .last_message
                .as_deref()
                .map(|body| truncate_chars(body, preview_chars)),
            id: chat.id,
            name: chat.name,
            unread_count: chat.unread_count,
        }
    }
}

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Whether a message was sent by this account or received from the contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Outbound,
    Inbound,
}

/// A message fetched from a chat's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub from_me: bool,
    /// Unix timestamp (seconds) as reported by WhatsApp.
    #[serde(default)]
    pub timestamp: i64,
    /// Message type (`chat`, `image`, `ptt`, ...).
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
}

impl ChatMessage {
    pub fn direction(&self) -> MessageDirection {
        if self.from_me {
            MessageDirection::Outbound
        } else {
            MessageDirection::Inbound
        }
    }
}

/// A message event pushed by the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    /// Sender chat id.
    pub from: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
}

impl InboundMessage {
    /// Phone-number part of the sender id (before `@`).
    pub fn sender_number(&self) -> &str {
        self.from.split('@').next().unwrap_or(&self.from)
    }

    /// Timestamp as a UTC datetime, if in range.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// The transport's handle for a message it accepted for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

fn default_message_type() -> String {
    "chat".to_string()
}
