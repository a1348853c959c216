pub mod filter;
pub mod limiter;
pub mod normalize;

use chrono::{DateTime, Utc};

use crate::chat::{ChatMessage, MessageKind};
use crate::config::Config;
use filter::{FilterChain, Rejection};
use limiter::{Candidate, Decision, RateLimiter, Throttle};

/// A message that passed every gate and should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub author: String,
    pub raw: String,
    pub normalized: String,
}

/// Outcome of running one chat message through the intake pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not a text event, or empty.
    Skipped,
    Filtered(Rejection),
    Throttled(Throttle),
    Accepted(Accepted),
}

/// Normalizer, filter chain and rate limiter, applied in that order.
#[derive(Debug)]
pub struct Intake {
    strip_urls: bool,
    filter: FilterChain,
    limiter: RateLimiter,
}

impl Intake {
    pub fn new(config: &Config) -> Self {
        Self {
            strip_urls: config.filter.strip_urls,
            filter: FilterChain::from_config(&config.filter),
            limiter: RateLimiter::new(&config.rate_limit, &config.bot.name),
        }
    }

    pub fn evaluate(&mut self, message: &ChatMessage, now: DateTime<Utc>) -> Verdict {
        let raw = message.text.trim();
        if message.kind != MessageKind::Text || raw.is_empty() {
            return Verdict::Skipped;
        }

        let normalized = normalize::normalize(raw, self.strip_urls);

        if let Err(rejection) = self.filter.check(&normalized) {
            return Verdict::Filtered(rejection);
        }

        let candidate = Candidate {
            author: &message.author,
            raw,
            normalized: &normalized,
        };
        match self.limiter.admit(&candidate, now) {
            Decision::Admit => Verdict::Accepted(Accepted {
                author: message.author.clone(),
                raw: raw.to_string(),
                normalized,
            }),
            Decision::Reject(throttle) => Verdict::Throttled(throttle),
        }
    }

    #[allow(dead_code)]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    #[test]
    fn test_skips_non_text_and_empty() {
        let mut intake = Intake::new(&Config::default());
        let mut sticker = ChatMessage::text("Kim", "AI look");
        sticker.kind = MessageKind::Other("superStickerEvent".to_string());
        assert_eq!(intake.evaluate(&sticker, t(0)), Verdict::Skipped);
        assert_eq!(
            intake.evaluate(&ChatMessage::text("Kim", "   "), t(0)),
            Verdict::Skipped
        );
    }

    #[test]
    fn test_filter_runs_on_normalized_text() {
        let mut intake = Intake::new(&Config::default());
        assert_eq!(
            intake.evaluate(&ChatMessage::text("Kim", "!AI command"), t(0)),
            Verdict::Filtered(Rejection::IgnoredPrefix("!".to_string()))
        );
        assert_eq!(
            intake.evaluate(&ChatMessage::text("Kim", "a"), t(0)),
            Verdict::Filtered(Rejection::TooShort(1))
        );
    }

    #[test]
    fn test_accepts_and_masks_urls() {
        let mut intake = Intake::new(&Config::default());
        let verdict = intake.evaluate(
            &ChatMessage::text("Kim", "AI  check   https://example.com/x"),
            t(0),
        );
        assert_eq!(
            verdict,
            Verdict::Accepted(Accepted {
                author: "Kim".to_string(),
                raw: "AI  check   https://example.com/x".to_string(),
                normalized: "AI check [link]".to_string(),
            })
        );
        assert_eq!(intake.limiter().last_global(), Some(t(0)));
    }

    #[test]
    fn test_filtered_messages_do_not_touch_limiter() {
        let mut intake = Intake::new(&Config::default());
        intake.evaluate(&ChatMessage::text("Kim", "/AI"), t(0));
        assert!(intake.limiter().last_global().is_none());
        assert!(intake.limiter().last_author("Kim").is_none());
    }
}
