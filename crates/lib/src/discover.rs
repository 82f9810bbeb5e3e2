//! Chat discovery: summarize the account's dialogs so users can pick allow-list ids.

use crate::config::ENV_ALLOW_LIST;
use crate::event::ConversationKind;

const MAX_GROUPS_SHOWN: usize = 10;
const MAX_CHANNELS_SHOWN: usize = 10;
const MAX_DIRECT_SHOWN: usize = 5;
const NAME_WIDTH: usize = 40;

/// One dialog (conversation) as reported by the session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogSummary {
    pub name: String,
    /// Marked id, the same value inbound events carry as `chat_id`.
    pub id: i64,
    pub kind: ConversationKind,
}

fn of_kind(dialogs: &[DialogSummary], kind: ConversationKind) -> Vec<&DialogSummary> {
    dialogs.iter().filter(|d| d.kind == kind).collect()
}

/// Example allow-list: up to two groups, one channel and one direct message.
/// None when there are no dialogs at all.
pub fn suggest_allow_list(dialogs: &[DialogSummary]) -> Option<String> {
    let ids: Vec<String> = of_kind(dialogs, ConversationKind::Group)
        .into_iter()
        .take(2)
        .chain(of_kind(dialogs, ConversationKind::Channel).into_iter().take(1))
        .chain(of_kind(dialogs, ConversationKind::Direct).into_iter().take(1))
        .map(|d| d.id.to_string())
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids.join(","))
    }
}

fn row(d: &DialogSummary) -> String {
    let name: String = d.name.chars().take(NAME_WIDTH).collect();
    format!("  {:<width$} | ID: {}", name, d.id, width = NAME_WIDTH)
}

/// Human-readable listing printed by `tg-relay chats`.
pub fn render_dialogs(dialogs: &[DialogSummary]) -> String {
    let groups = of_kind(dialogs, ConversationKind::Group);
    let channels = of_kind(dialogs, ConversationKind::Channel);
    let direct = of_kind(dialogs, ConversationKind::Direct);

    let mut out = String::new();
    out.push_str("Your chats and their IDs:\n");
    out.push_str(&"=".repeat(60));
    out.push('\n');

    if !groups.is_empty() {
        out.push_str("\nGROUPS:\n");
        for d in groups.iter().take(MAX_GROUPS_SHOWN) {
            out.push_str(&row(d));
            out.push('\n');
        }
    }
    if !channels.is_empty() {
        out.push_str("\nCHANNELS:\n");
        for d in channels.iter().take(MAX_CHANNELS_SHOWN) {
            out.push_str(&row(d));
            out.push('\n');
        }
    }
    if !direct.is_empty() {
        out.push_str(&format!(
            "\nDIRECT MESSAGES: {} total (showing first {})\n",
            direct.len(),
            MAX_DIRECT_SHOWN.min(direct.len())
        ));
        for d in direct.iter().take(MAX_DIRECT_SHOWN) {
            out.push_str(&row(d));
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str("Example allow-list configuration:\n");
    match suggest_allow_list(dialogs) {
        Some(ids) => out.push_str(&format!("{}={}\n", ENV_ALLOW_LIST, ids)),
        None => out.push_str("No chats found. Join a group or start a conversation first.\n"),
    }
    out
}
