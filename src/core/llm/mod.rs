//! Language-model backend contract.
//!
//! The backend fails closed: any transport, auth, or response-shape failure
//! comes back as an `LlmError` value, never a panic, and the conversation
//! side converts it into a fail-soft spoken reply.

pub mod openai;

pub use openai::OpenAiChat;

use crate::core::docstore::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Document reference consumed from the pending slot when this user
    /// message was formed. At most one turn carries any given reference.
    pub attachment: Option<DocumentRef>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            attachment: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Option<DocumentRef>) -> Self {
        self.attachment = attachment;
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Contract for the language-model call.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Complete the conversation given the ordered message sequence
    /// (system prompt first, then the windowed history).
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}
