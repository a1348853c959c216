use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};

use crate::config::RateLimitConfig;

/// Floor for the duplicate-suppression window, whatever the per-author cooldown.
pub const DUPLICATE_WINDOW_FLOOR_SECS: u64 = 30;

fn secs(n: u64) -> TimeDelta {
    i64::try_from(n)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Key used for duplicate suppression and sampling.
pub fn duplicate_key(author: &str, normalized: &str) -> String {
    format!("{}:{}", author, normalized.to_lowercase())
}

/// Stable bucket in `0..100` derived from SHA-256 of the key, so a given
/// author+text pair always samples the same way across runs and builds.
pub fn sample_bucket(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % 100
}

/// Last-seen timestamps per key with bounded size.
///
/// Entries older than `retention` can no longer affect a cooldown check, so
/// they are pruned once the map grows past `capacity`. If every entry is still
/// live the oldest ones are dropped.
#[derive(Debug)]
pub struct CooldownMap {
    entries: HashMap<String, DateTime<Utc>>,
    retention: TimeDelta,
    capacity: usize,
}

impl CooldownMap {
    pub fn new(retention: TimeDelta, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            retention,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    /// True while less than `window` has passed since the key was recorded.
    /// Unknown keys are never cooling down.
    pub fn is_cooling(&self, key: &str, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.get(key).is_some_and(|last| now - last < window)
    }

    /// Record `now` for the key. Stored timestamps never move backwards.
    pub fn record(&mut self, key: &str, now: DateTime<Utc>) {
        self.entries
            .entry(key.to_string())
            .and_modify(|t| *t = (*t).max(now))
            .or_insert(now);

        if self.entries.len() > self.capacity {
            self.prune(now);
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let retention = self.retention;
        self.entries.retain(|_, t| now - *t < retention);

        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess > 0 {
            let mut by_age: Vec<(DateTime<Utc>, String)> = self
                .entries
                .iter()
                .map(|(k, t)| (*t, k.clone()))
                .collect();
            by_age.sort();
            for (_, key) in by_age.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The message facts the limiter needs.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub author: &'a str,
    /// Text as received, used for the mention check.
    pub raw: &'a str,
    pub normalized: &'a str,
}

/// Which throttle turned a message away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    AuthorCooldown,
    Duplicate,
    Sampled,
    GlobalCooldown,
    NotMentioned,
}

impl std::fmt::Display for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Throttle::AuthorCooldown => write!(f, "author cooldown"),
            Throttle::Duplicate => write!(f, "duplicate message"),
            Throttle::Sampled => write!(f, "sampled out"),
            Throttle::GlobalCooldown => write!(f, "global cooldown"),
            Throttle::NotMentioned => write!(f, "bot not mentioned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject(Throttle),
}

/// Stateful gate combining the global, per-author, duplicate and sampling throttles.
///
/// All checks and the state update happen inside one `&mut self` call, so a
/// decision and its bookkeeping can never interleave with another message.
#[derive(Debug)]
pub struct RateLimiter {
    bot_name_lower: String,
    only_when_mentioned: bool,
    cooldown: TimeDelta,
    per_user_cooldown: TimeDelta,
    duplicate_window: TimeDelta,
    random_ratio: f64,
    last_global: Option<DateTime<Utc>>,
    last_author: CooldownMap,
    last_duplicate: CooldownMap,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, bot_name: &str) -> Self {
        let per_user_cooldown = secs(config.per_user_cooldown_secs);
        let duplicate_window = secs(
            config
                .per_user_cooldown_secs
                .max(DUPLICATE_WINDOW_FLOOR_SECS),
        );
        Self {
            bot_name_lower: bot_name.to_lowercase(),
            only_when_mentioned: config.only_when_mentioned,
            cooldown: secs(config.cooldown_secs),
            per_user_cooldown,
            duplicate_window,
            random_ratio: config.random_ratio,
            last_global: None,
            last_author: CooldownMap::new(per_user_cooldown, config.max_tracked_keys),
            last_duplicate: CooldownMap::new(duplicate_window, config.max_tracked_keys),
        }
    }

    fn mentions_bot(&self, raw: &str) -> bool {
        raw.to_lowercase().contains(&self.bot_name_lower)
    }

    fn evaluate(&self, candidate: &Candidate<'_>, key: &str, now: DateTime<Utc>) -> Decision {
        if self
            .last_author
            .is_cooling(candidate.author, now, self.per_user_cooldown)
        {
            return Decision::Reject(Throttle::AuthorCooldown);
        }

        if self.last_duplicate.is_cooling(key, now, self.duplicate_window) {
            return Decision::Reject(Throttle::Duplicate);
        }

        let mention_ok = !self.only_when_mentioned || self.mentions_bot(candidate.raw);

        if self.random_ratio < 1.0 {
            let threshold = (self.random_ratio * 100.0).floor() as u64;
            if sample_bucket(key) > threshold {
                return Decision::Reject(Throttle::Sampled);
            }
        }

        if self.last_global.is_some_and(|last| now - last < self.cooldown) {
            return Decision::Reject(Throttle::GlobalCooldown);
        }

        if !mention_ok {
            return Decision::Reject(Throttle::NotMentioned);
        }

        Decision::Admit
    }

    /// Decide whether to answer this message at `now`; on admit, record it.
    pub fn admit(&mut self, candidate: &Candidate<'_>, now: DateTime<Utc>) -> Decision {
        let key = duplicate_key(candidate.author, candidate.normalized);
        let decision = self.evaluate(candidate, &key, now);

        if decision == Decision::Admit {
            self.last_global = Some(self.last_global.map_or(now, |t| t.max(now)));
            self.last_author.record(candidate.author, now);
            self.last_duplicate.record(&key, now);
        }

        decision
    }

    #[allow(dead_code)]
    pub fn last_global(&self) -> Option<DateTime<Utc>> {
        self.last_global
    }

    #[allow(dead_code)]
    pub fn last_author(&self, author: &str) -> Option<DateTime<Utc>> {
        self.last_author.get(author)
    }

    #[allow(dead_code)]
    pub fn last_duplicate(&self, author: &str, normalized: &str) -> Option<DateTime<Utc>> {
        self.last_duplicate.get(&duplicate_key(author, normalized))
    }

    #[allow(dead_code)]
    pub fn tracked_authors(&self) -> usize {
        self.last_author.len()
    }
}
