//! Allow-list of conversation ids permitted to reach the webhook.
//!
//! Parsed once at startup from a comma-separated string (e.g. `TELEGRAM_WHITELIST_CHATS`)
//! and shared read-only afterwards.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllowListError {
    #[error("invalid allow-list entry {entry:?}: expected comma-separated chat ids (e.g. '-1001234567890,123456789')")]
    InvalidEntry { entry: String },
}

/// Set of conversation ids. An empty list permits every conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: HashSet<i64>,
}

impl AllowList {
    /// Parse a comma-separated id list. Segments are trimmed and empty segments dropped;
    /// any other segment that is not an integer fails the whole parse.
    pub fn parse(raw: &str) -> Result<Self, AllowListError> {
        let mut ids = HashSet::new();
        for segment in raw.split(',') {
            let entry = segment.trim();
            if entry.is_empty() {
                continue;
            }
            let id = entry
                .parse::<i64>()
                .map_err(|_| AllowListError::InvalidEntry {
                    entry: entry.to_string(),
                })?;
            ids.insert(id);
        }
        Ok(Self { ids })
    }

    pub fn contains(&self, chat_id: i64) -> bool {
        self.ids.contains(&chat_id)
    }

    /// Whether messages from `chat_id` may be forwarded. Empty list => forward everything.
    pub fn permits(&self, chat_id: i64) -> bool {
        self.ids.is_empty() || self.contains(chat_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ascending order (for logging and stable output).
    pub fn ids_sorted(&self) -> Vec<i64> {
        let mut v: Vec<i64> = self.ids.iter().copied().collect();
        v.sort_unstable();
        v
    }
}

impl FromIterator<i64> for AllowList {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
