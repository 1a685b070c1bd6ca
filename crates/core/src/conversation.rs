use crate::models::TextChunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "sender", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
        sent_at: DateTime<Utc>,
    },
    Bot {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_chunks: Option<Vec<TextChunk>>,
        sent_at: DateTime<Utc>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn bot(content: impl Into<String>, source_chunks: Option<Vec<TextChunk>>) -> Self {
        Self::Bot {
            content: content.into(),
            source_chunks,
            sent_at: Utc::now(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User { content, .. } | Self::Bot { content, .. } => content,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn source_chunks(&self) -> Option<&[TextChunk]> {
        match self {
            Self::Bot {
                source_chunks: Some(chunks),
                ..
            } => Some(chunks),
            _ => None,
        }
    }
}

/// Chronological, append-only log of the messages shown to the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user_message(&mut self, text: impl Into<String>) -> &Message {
        self.push(Message::user(text))
    }

    pub fn append_bot_message(
        &mut self,
        text: impl Into<String>,
        source_chunks: Option<Vec<TextChunk>>,
    ) -> &Message {
        self.push(Message::bot(text, source_chunks))
    }

    /// Appends a finished question/answer pair and returns it.
    pub fn append_exchange(
        &mut self,
        question: impl Into<String>,
        answer: impl Into<String>,
        source_chunks: Option<Vec<TextChunk>>,
    ) -> &[Message] {
        let user = Message::user(question);
        let bot = Message::bot(answer, source_chunks);
        self.messages.extend([user, bot]);
        &self.messages[self.messages.len() - 2..]
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

    pub fn reset(&mut self) {
        self.messages = Vec::new();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}
