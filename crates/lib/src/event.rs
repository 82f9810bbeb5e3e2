//! Inbound message event: produced by the session adapter, consumed by the relay.

use chrono::{DateTime, Utc};

/// Kind of conversation a message arrived in. A conversation is never both a group and a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// Basic group or supergroup.
    Group,
    /// Broadcast channel.
    Channel,
    /// One-to-one conversation with a user.
    Direct,
}

impl ConversationKind {
    pub fn is_group(self) -> bool {
        self == ConversationKind::Group
    }

    pub fn is_channel(self) -> bool {
        self == ConversationKind::Channel
    }

    /// Short label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            ConversationKind::Group => "group",
            ConversationKind::Channel => "channel",
            ConversationKind::Direct => "DM",
        }
    }
}

/// A new incoming message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Marked conversation id (users positive, groups negative, channels `-100…`).
    pub chat_id: i64,
    /// None for anonymous channel posts.
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
    pub kind: ConversationKind,
    pub message_id: i32,
    pub reply_to_msg_id: Option<i32>,
}
