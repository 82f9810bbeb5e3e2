//! JSON body POSTed to the webhook.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::event::InboundEvent;

/// Flat record sent to the webhook for each forwarded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    /// Message text; empty string when the message has none (media only, service message).
    pub message: String,
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    /// ISO-8601 UTC with milliseconds, e.g. `2024-01-15T14:30:00.000Z`.
    pub date: String,
    pub is_group: bool,
    pub is_channel: bool,
    pub message_id: i32,
    pub reply_to_msg_id: Option<i32>,
}

impl OutboundPayload {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self {
            message: event.text.clone().unwrap_or_default(),
            chat_id: event.chat_id,
            sender_id: event.sender_id,
            date: format_date(&event.date),
            is_group: event.kind.is_group(),
            is_channel: event.kind.is_channel(),
            message_id: event.message_id,
            reply_to_msg_id: event.reply_to_msg_id,
        }
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
