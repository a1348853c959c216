use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Tone;
use crate::llm::Generator;

/// Builds replies to viewers, falling back to a template when the
/// generation backend is missing or misbehaves. Never returns an error.
pub struct Responder {
    bot_name: String,
    tone: Tone,
    generator: Option<Arc<dyn Generator>>,
    timeout: Duration,
}

impl Responder {
    pub fn new(
        bot_name: impl Into<String>,
        tone: Tone,
        generator: Option<Arc<dyn Generator>>,
        timeout: Duration,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            tone,
            generator,
            timeout,
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Deterministic reply used whenever generation is unavailable.
    pub fn fallback(author: &str, message: &str) -> String {
        format!("Hi {}! Thanks for the message: {}", author, message)
    }

    fn tone_hint(&self) -> String {
        format!("Please answer in {}.", self.tone.description())
    }

    /// Prompt sent to the backend.
    pub fn build_prompt(&self, author: &str, message: &str) -> String {
        format!(
            "You are an AI co-host on a YouTube live stream. Reply briefly and warmly. \
             The viewer is {} and the message is: {}\n{}:",
            author, message, self.bot_name
        )
    }

    pub async fn respond(&self, author: &str, message: &str) -> String {
        let Some(generator) = &self.generator else {
            return Self::fallback(author, message);
        };

        let prompt = self.build_prompt(author, &format!("{}\n{}", message, self.tone_hint()));

        match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("Generator returned empty text, using fallback");
                    Self::fallback(author, message)
                } else {
                    text.to_string()
                }
            }
            Ok(Err(e)) => {
                warn!("Response generation failed: {:#}", e);
                Self::fallback(author, message)
            }
            Err(_) => {
                warn!("Response generation timed out after {:?}", self.timeout);
                Self::fallback(author, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    struct Stalled;

    #[async_trait]
    impl Generator for Stalled {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn responder(generator: Option<Arc<dyn Generator>>) -> Responder {
        Responder::new("AI", Tone::Energetic, generator, Duration::from_secs(5))
    }

    fn with_backend(generator: Arc<dyn Generator>) -> Responder {
        responder(Some(generator))
    }

    #[tokio::test]
    async fn test_no_backend_uses_template() {
        let reply = responder(None).respond("Kim", "AI 안녕").await;
        assert_eq!(reply, "Hi Kim! Thanks for the message: AI 안녕");
    }

    #[tokio::test]
    async fn test_backend_text_is_trimmed() {
        let backend = Scripted::new(Ok("  반가워요!  \n"));
        let reply = with_backend(backend.clone()).respond("Kim", "AI 안녕").await;
        assert_eq!(reply, "반가워요!");

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The viewer is Kim"));
        assert!(prompts[0].contains("AI 안녕\nPlease answer in a bright, high-energy voice."));
        assert!(prompts[0].ends_with("\nAI:"));
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back() {
        let backend = Scripted::new(Err("connection refused"));
        let reply = with_backend(backend).respond("Kim", "AI 안녕").await;
        assert_eq!(reply, Responder::fallback("Kim", "AI 안녕"));
    }

    #[tokio::test]
    async fn test_empty_backend_text_falls_back() {
        let backend = Scripted::new(Ok("   "));
        let reply = with_backend(backend).respond("Lee", "hi AI").await;
        assert_eq!(reply, "Hi Lee! Thanks for the message: hi AI");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_timeout_falls_back() {
        let reply = with_backend(Arc::new(Stalled)).respond("Kim", "AI?").await;
        assert_eq!(reply, Responder::fallback("Kim", "AI?"));
    }
}
