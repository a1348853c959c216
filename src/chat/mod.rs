pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;

/// Polling hint used when the chat source does not suggest one.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Event kind of a chat item. Only `Text` is ever answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Other(String),
}

/// A message received from the live chat
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Display name of the author (not a stable id)
    pub author: String,
    /// The display text as delivered by the source
    pub text: String,
    pub kind: MessageKind,
}

impl ChatMessage {
    #[allow(dead_code)]
    pub fn text(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            kind: MessageKind::Text,
        }
    }
}

/// One page of messages plus the continuation state for the next fetch.
#[derive(Debug, Clone, Default)]
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    pub next_page_token: Option<String>,
    pub polling_interval_ms: Option<u64>,
}

/// Paginated message source
#[async_trait]
pub trait ChatSource: Send + Sync {
    async fn fetch(&self, page_token: Option<&str>) -> Result<ChatPage>;
}

/// Continuation token plus the backend-suggested wait, owned by the dispatcher.
#[derive(Debug, Clone)]
pub struct PollCursor {
    pub token: Option<String>,
    pub interval_ms: u64,
}

impl Default for PollCursor {
    fn default() -> Self {
        Self {
            token: None,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl PollCursor {
    /// Move past a successfully fetched page.
    pub fn advance(&mut self, page: &ChatPage) {
        self.token = page.next_page_token.clone();
        self.interval_ms = page.polling_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    }
}
