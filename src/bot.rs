use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::agent::Responder;
use crate::chat::{ChatMessage, ChatSource, PollCursor};
use crate::pipeline::{Intake, Verdict};
use crate::sinks::{Exchange, Sink};

/// Delay before polling again after a failed cycle.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Never poll faster than this, whatever the chat source suggests.
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(1000);

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Dispatcher state. The loop cycles Polling → Processing → Sleeping forever.
#[derive(Debug)]
pub enum LoopState {
    Polling,
    Processing(Vec<ChatMessage>),
    Sleeping(Duration),
}

/// Counts for one processed batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub answered: usize,
    pub failed: usize,
}

/// Drives polling and pushes each message through the intake pipeline,
/// the responder and the sinks.
pub struct Dispatcher {
    source: Arc<dyn ChatSource>,
    intake: Intake,
    responder: Responder,
    sinks: Vec<Arc<dyn Sink>>,
    cursor: PollCursor,
    clock: Clock,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn ChatSource>,
        intake: Intake,
        responder: Responder,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Self {
        Self {
            source,
            intake,
            responder,
            sinks,
            cursor: PollCursor::default(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for rate limiting.
    #[allow(dead_code)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[allow(dead_code)]
    pub fn cursor(&self) -> &PollCursor {
        &self.cursor
    }

    #[allow(dead_code)]
    pub fn intake(&self) -> &Intake {
        &self.intake
    }

    fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.cursor.interval_ms).max(MIN_POLL_DELAY)
    }

    /// Perform one state transition.
    pub async fn step(&mut self, state: LoopState) -> Result<LoopState> {
        match state {
            LoopState::Polling => {
                let page = self
                    .source
                    .fetch(self.cursor.token.as_deref())
                    .await
                    .context("Failed to fetch chat messages")?;
                self.cursor.advance(&page);
                Ok(LoopState::Processing(page.messages))
            }
            LoopState::Processing(batch) => {
                let summary = self.process_batch(&batch).await;
                if summary.received > 0 {
                    debug!(
                        "Processed {} message(s): {} answered, {} failed",
                        summary.received, summary.answered, summary.failed
                    );
                }
                Ok(LoopState::Sleeping(self.poll_delay()))
            }
            LoopState::Sleeping(delay) => {
                tokio::time::sleep(delay).await;
                Ok(LoopState::Polling)
            }
        }
    }

    /// Poll once and process the page. Returns how long to sleep afterwards.
    #[allow(dead_code)]
    pub async fn run_cycle(&mut self) -> Result<Duration> {
        let mut state = LoopState::Polling;
        loop {
            state = match self.step(state).await? {
                LoopState::Sleeping(delay) => return Ok(delay),
                next => next,
            };
        }
    }

    /// Run until the process is terminated. Any failed cycle is logged and
    /// retried after `RETRY_DELAY` with the cursor unchanged.
    pub async fn run(&mut self) -> Result<()> {
        info!("Polling live chat...");
        let mut state = LoopState::Polling;
        loop {
            state = match self.step(state).await {
                Ok(next) => next,
                Err(e) => {
                    error!("Cycle failed: {:#}", e);
                    LoopState::Sleeping(RETRY_DELAY)
                }
            };
        }
    }

    /// Handle a batch in fetch order. A failing message never stops the batch.
    pub async fn process_batch(&mut self, batch: &[ChatMessage]) -> BatchSummary {
        let mut summary = BatchSummary {
            received: batch.len(),
            ..Default::default()
        };

        for message in batch {
            match self.handle_message(message).await {
                Ok(Some(_)) => summary.answered += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.answered += 1;
                    summary.failed += 1;
                    error!("Failed to handle message from {}: {:#}", message.author, e);
                }
            }
        }

        summary
    }

    /// Returns the published exchange, or `None` when the message was dropped.
    pub async fn handle_message(&mut self, message: &ChatMessage) -> Result<Option<Exchange>> {
        let now = (self.clock)();
        let accepted = match self.intake.evaluate(message, now) {
            Verdict::Accepted(accepted) => accepted,
            Verdict::Skipped => return Ok(None),
            Verdict::Filtered(reason) => {
                debug!("Dropped message from {}: {}", message.author, reason);
                return Ok(None);
            }
            Verdict::Throttled(reason) => {
                debug!("Throttled message from {}: {}", message.author, reason);
                return Ok(None);
            }
        };

        let reply = self
            .responder
            .respond(&accepted.author, &accepted.normalized)
            .await;

        let exchange = Exchange {
            author: accepted.author,
            message: accepted.normalized,
            bot_name: self.responder.bot_name().to_string(),
            reply,
        };

        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(&exchange).await {
                warn!("Sink '{}' failed: {:#}", sink.name(), e);
                first_error
                    .get_or_insert(e.context(format!("Sink '{}' failed", sink.name())));
            }
        }

        info!(
            author = %exchange.author,
            message = %accepted.raw,
            reply = %exchange.reply,
            "Answered chat message"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(Some(exchange)),
        }
    }
}
