//! Decide whether an inbound event is forwarded and build its webhook payload.

use crate::allowlist::AllowList;
use crate::event::InboundEvent;
use crate::payload::OutboundPayload;

const PREVIEW_CHARS: usize = 50;

/// Returns the payload to deliver, or None when the conversation is not on the allow-list.
pub fn should_forward_and_format(
    event: &InboundEvent,
    allow_list: &AllowList,
) -> Option<OutboundPayload> {
    if !allow_list.permits(event.chat_id) {
        log::debug!(
            "message from non-allowed chat {} - discarding",
            event.chat_id
        );
        return None;
    }

    let payload = OutboundPayload::from_event(event);
    let reply_info = event
        .reply_to_msg_id
        .map(|id| format!(" (replying to msg {})", id))
        .unwrap_or_default();
    log::info!(
        "new message from {} {}: {}{}",
        event.kind.label(),
        event.chat_id,
        preview(&payload.message),
        reply_info
    );
    Some(payload)
}

/// First 50 characters of `text`, with "..." appended when truncated.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
