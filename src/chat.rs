use serde::Serialize;

use crate::utils::get_timestamp;

pub const GREETING: &str = "Hello, commander! Ready to review your move?";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Speaker {
    General,
    User,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub from: Speaker,
    pub text: String,
    pub sent_timestamp: u64,
}

impl ChatMessage {
    fn new(from: Speaker, text: impl Into<String>) -> Self {
        Self {
            from,
            text: text.into(),
            sent_timestamp: get_timestamp(),
        }
    }
}

/// Conversation with the General for the current session, oldest first.
#[derive(Debug, Clone)]
pub struct ChatLog(Vec<ChatMessage>);

impl Default for ChatLog {
    fn default() -> Self {
        Self(vec![ChatMessage::new(Speaker::General, GREETING)])
    }
}

impl ChatLog {
    /// Append a line and return a copy for the event stream.
    pub fn push(&mut self, from: Speaker, text: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(from, text);
        self.0.push(message.clone());
        message
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }
}
