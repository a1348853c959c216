use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Exchange, Sink};
use crate::config::TtsConfig;

/// Speaks the reply through an external TTS command (macOS `say` by default).
/// Best effort: spawn failures, non-zero exits and timeouts are logged and ignored.
pub struct SpeechSink {
    command: String,
    voice: Option<String>,
    rate: Option<String>,
    timeout: Duration,
}

impl SpeechSink {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            command: config.command.clone(),
            voice: config.voice.clone(),
            rate: config.rate.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn args(&self, text: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = &self.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        if let Some(rate) = &self.rate {
            args.push("-r".to_string());
            args.push(rate.clone());
        }
        args.push(text.to_string());
        args
    }
}

#[async_trait]
impl Sink for SpeechSink {
    fn name(&self) -> &str {
        "speech"
    }

    async fn publish(&self, exchange: &Exchange) -> Result<()> {
        let status = Command::new(&self.command)
            .args(self.args(&exchange.reply))
            .kill_on_drop(true)
            .status();

        // Dropping the timed-out future kills the child.
        match tokio::time::timeout(self.timeout, status).await {
            Ok(Ok(status)) if !status.success() => {
                debug!("Speech command '{}' exited with {}", self.command, status);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!("Speech command '{}' failed to run: {}", self.command, e);
            }
            Err(_) => {
                warn!(
                    "Speech command '{}' timed out after {:?}",
                    self.command, self.timeout
                );
            }
        }
        Ok(())
    }
}
