use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Exchange, Sink};

/// Overwrites a text file with the latest exchange for a stream overlay to read.
pub struct OverlaySink {
    path: PathBuf,
}

impl OverlaySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn render(exchange: &Exchange) -> String {
        format!(
            "{}: {}\n{}: {}\n",
            exchange.author, exchange.message, exchange.bot_name, exchange.reply
        )
    }
}

#[async_trait]
impl Sink for OverlaySink {
    fn name(&self) -> &str {
        "overlay"
    }

    async fn publish(&self, exchange: &Exchange) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create overlay directory: {}", parent.display())
            })?;
        }

        tokio::fs::write(&self.path, Self::render(exchange))
            .await
            .with_context(|| format!("Failed to write overlay file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(reply: &str) -> Exchange {
        Exchange {
            author: "Kim".to_string(),
            message: "AI 안녕".to_string(),
            bot_name: "AI".to_string(),
            reply: reply.to_string(),
        }
    }

    #[tokio::test]
    async fn test_creates_parent_and_writes_two_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/obs/overlay.txt");
        let sink = OverlaySink::new(&path);

        sink.publish(&exchange("안녕하세요!")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Kim: AI 안녕\nAI: 안녕하세요!\n");
    }

    #[tokio::test]
    async fn test_overwrites_previous_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.txt");
        let sink = OverlaySink::new(&path);

        sink.publish(&exchange("first reply that is rather long")).await.unwrap();
        sink.publish(&exchange("second")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(content, "Kim: AI 안녕\nAI: second\n");
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();

        let err = OverlaySink::new(&path)
            .publish(&exchange("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to write overlay file"));
    }
}
