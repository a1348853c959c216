pub mod overlay;
pub mod speech;

use anyhow::Result;
use async_trait::async_trait;

/// A viewer message and the bot's answer to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub author: String,
    /// Normalized message text
    pub message: String,
    pub bot_name: String,
    pub reply: String,
}

/// Destination for accepted exchanges
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;
    async fn publish(&self, exchange: &Exchange) -> Result<()>;
}
