//! UI-agnostic conversation state
//!
//! These types are shared by every front end and don't depend on any
//! specific UI framework. A conversation lives only as long as the process
//! that holds it.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::format;

/// One message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Local>,
    /// True when `content` holds at least one fenced code block
    pub is_code: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self::at(role, content, Local::now())
    }

    pub fn at(role: ChatRole, content: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        let content = content.into();
        let is_code = format::has_code_block(&content);
        Self {
            role,
            content,
            timestamp,
            is_code,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Local wall-clock time as `HH:MM`
    pub fn time_label(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%H:%M").to_string()
}

/// Ordered, append-only list of turns.
///
/// Turns are never edited or removed once pushed, so indices handed out by
/// `push` stay valid for the lifetime of the store.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    turns: Vec<ChatTurn>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// Most recent turn written by the assistant
    pub fn last_assistant(&self) -> Option<&ChatTurn> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == ChatRole::Assistant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_store_preserves_insertion_order() {
        let mut store = MessageStore::new();
        assert_eq!(store.push(ChatTurn::user("first")), 0);
        assert_eq!(store.push(ChatTurn::assistant("second")), 1);
        assert_eq!(store.push(ChatTurn::user("third")), 2);

        let contents: Vec<&str> = store.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(store.last().map(|t| t.role), Some(ChatRole::User));
    }

    #[test]
    fn test_last_assistant_skips_user_turns() {
        let mut store = MessageStore::new();
        assert!(store.last_assistant().is_none());
        store.push(ChatTurn::assistant("reply"));
        store.push(ChatTurn::user("question"));
        assert_eq!(store.last_assistant().map(|t| t.content.as_str()), Some("reply"));
    }

    #[test]
    fn test_is_code_hint() {
        assert!(ChatTurn::assistant("see:\n```rust\nfn main() {}\n```").is_code);
        assert!(!ChatTurn::assistant("no code here").is_code);
        assert!(!ChatTurn::assistant("```unterminated\nstill text").is_code);
    }

    #[test]
    fn test_time_label_is_zero_padded() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let turn = ChatTurn::at(ChatRole::User, "hi", ts);
        assert_eq!(turn.time_label(), "07:05");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
