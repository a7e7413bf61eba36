//! Conversation history
//!
//! An append-only sequence of turns, seeded with one system turn and sent in
//! full on every chat request. Unbounded growth over a session is accepted.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name as sent to the chat backend
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Append-only conversation history
#[derive(Debug, Clone)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Create a history seeded with the system prompt
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self { turns: vec![Turn::system(system_prompt)] }
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Full ordered history, as sent on every chat request
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns including the seed system turn
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_seeded_with_a_system_turn() {
        let history = History::new("you are a test");
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].role, Role::System);
    }

    #[test]
    fn turns_keep_insertion_order() {
        let mut history = History::new("seed");
        history.push(Turn::user("hello"));
        history.push(Turn::assistant("hi"));

        let roles: Vec<Role> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(history.last().unwrap().content, "hi");
    }
}
