//! Conversation log types.
//!
//! The log is append-only: messages are never edited once pushed, and their
//! position in the log is both arrival order and display order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const WELCOME_TEXT: &str = "Hello! I'm NeuroPath Assistant. How can I help you today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Where a bot reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    Ai,
    Predefined,
    Fallback,
    EegAnalysis,
    AlzheimerAnalysis,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Welcome,
    Normal,
    Result,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Only set on bot messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceTag>,
    pub kind: MessageKind,
}

/// Ordered message log with its own id sequence.
#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageLog {
    /// A log holding only the welcome message.
    pub fn new() -> Self {
        let mut log = Self {
            messages: Vec::new(),
            next_id: 1,
        };
        log.push_welcome();
        log
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> Message {
        self.push(text.into(), Sender::User, None, MessageKind::Normal)
    }

    pub fn push_bot(
        &mut self,
        text: impl Into<String>,
        source: SourceTag,
        kind: MessageKind,
    ) -> Message {
        self.push(text.into(), Sender::Bot, Some(source), kind)
    }

    /// Drops every message and starts over with a fresh welcome message.
    ///
    /// The id sequence is not reset, so ids stay strictly increasing for the
    /// lifetime of the log.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.push_welcome();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn push_welcome(&mut self) {
        self.push(
            WELCOME_TEXT.to_string(),
            Sender::Bot,
            None,
            MessageKind::Welcome,
        );
    }

    fn push(
        &mut self,
        text: String,
        sender: Sender,
        source: Option<SourceTag>,
        kind: MessageKind,
    ) -> Message {
        let message = Message {
            id: self.next_id,
            text,
            sender,
            timestamp: Utc::now(),
            source,
            kind,
        };
        self.next_id += 1;
        self.messages.push(message.clone());
        message
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}
