//! Bounded conversation memory
//!
//! A fixed-size sliding window of prior turns, read by the prompt assembler
//! and written after every completed exchange. One memory belongs to exactly
//! one orchestration session; callers serving concurrent users must hold one
//! memory per session.

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation, in chronological order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sliding window over the most recent `window` exchanges.
///
/// Invariant: never holds more than `2 * window` turns; eviction is strict
/// FIFO (oldest exchange dropped first); stored order is chronological.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window: usize,
    turns: Vec<Turn>,
}

impl ConversationMemory {
    /// Create a memory retaining the last `window` exchanges
    pub fn new(window: usize) -> Self {
        Self {
            window,
            turns: Vec::new(),
        }
    }

    /// Record one completed exchange, then truncate to the window.
    /// Append-then-truncate is atomic from the caller's point of view: no
    /// partial turn is ever observable.
    pub fn append(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::user(user));
        self.turns.push(Turn::assistant(assistant));

        let max_turns = self.window * 2;
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Read-only view of the stored turns, oldest first
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Drop all stored turns
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of stored turns (not exchanges)
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Configured exchange window
    pub fn window(&self) -> usize {
        self.window
    }
}
