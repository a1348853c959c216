use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Style descriptor injected into the generation prompt.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(from = "String")]
pub enum Tone {
    Calm,
    #[default]
    Balanced,
    Energetic,
}

impl Tone {
    /// Case-insensitive; anything unrecognised is treated as `Balanced`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "calm" => Tone::Calm,
            "energetic" => Tone::Energetic,
            _ => Tone::Balanced,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tone::Calm => "a calm, steady voice",
            Tone::Balanced => "a friendly, natural voice",
            Tone::Energetic => "a bright, high-energy voice",
        }
    }
}

impl From<String> for Tone {
    fn from(value: String) -> Self {
        Tone::parse(&value)
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Calm => write!(f, "calm"),
            Tone::Balanced => write!(f, "balanced"),
            Tone::Energetic => write!(f, "energetic"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub tts: TtsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YouTubeConfig {
    #[serde(default)]
    pub api_key: String,
    /// Resolved from `video` at startup when absent.
    #[serde(default)]
    pub live_chat_id: Option<String>,
    /// Video id or watch/live/shorts URL of the stream.
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default = "default_overlay_path")]
    pub overlay_path: PathBuf,
    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Ollama model name. Without one every reply uses the fallback template.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_generate_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_min_message_len")]
    pub min_message_len: usize,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,
    #[serde(default)]
    pub ignored_words: Vec<String>,
    #[serde(default = "default_true")]
    pub strip_urls: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub only_when_mentioned: bool,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_per_user_cooldown_secs")]
    pub per_user_cooldown_secs: u64,
    #[serde(default = "default_random_ratio")]
    pub random_ratio: f64,
    /// Upper bound on remembered authors and author+message keys.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tts_command")]
    pub command: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    /// The speech process is killed after this long.
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_youtube_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_bot_name() -> String {
    "AI".to_string()
}

fn default_overlay_path() -> PathBuf {
    PathBuf::from("overlay.txt")
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_generate_timeout_secs() -> u64 {
    30
}

fn default_min_message_len() -> usize {
    2
}

fn default_max_message_len() -> usize {
    200
}

fn default_ignored_prefixes() -> Vec<String> {
    vec!["!".to_string(), "/".to_string()]
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_per_user_cooldown_secs() -> u64 {
    20
}

fn default_random_ratio() -> f64 {
    1.0
}

fn default_max_tracked_keys() -> usize {
    10_000
}

fn default_tts_command() -> String {
    "say".to_string()
}

fn default_tts_timeout_secs() -> u64 {
    60
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            live_chat_id: None,
            video: None,
            base_url: default_youtube_base_url(),
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            overlay_path: default_overlay_path(),
            tone: Tone::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: default_llm_base_url(),
            timeout_secs: default_generate_timeout_secs(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_message_len: default_min_message_len(),
            max_message_len: default_max_message_len(),
            ignored_prefixes: default_ignored_prefixes(),
            ignored_words: Vec::new(),
            strip_urls: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            only_when_mentioned: true,
            cooldown_secs: default_cooldown_secs(),
            per_user_cooldown_secs: default_per_user_cooldown_secs(),
            random_ratio: default_random_ratio(),
            max_tracked_keys: default_max_tracked_keys(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_tts_command(),
            voice: None,
            rate: None,
            timeout_secs: default_tts_timeout_secs(),
        }
    }
}

/// Split a comma-separated env value, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Env flags are on unless explicitly "0".
fn parse_flag(value: &str) -> bool {
    value.trim() != "0"
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Config {
    /// Read the TOML file (if present) and layer environment overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            info!(
                "No config file at {}, using defaults and environment",
                path.display()
            );
            Config::default()
        };

        config.apply_env(lookup)?;
        config.sanitize();
        Ok(config)
    }

    /// Apply overrides from the `.env`-style variables (`YOUTUBE_API_KEY`, `BOT_NAME`, ...).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("YOUTUBE_API_KEY") {
            self.youtube.api_key = v.trim().to_string();
        }
        if let Some(v) = lookup("LIVE_CHAT_ID") {
            self.youtube.live_chat_id = non_empty(v);
        }
        let video_id = lookup("VIDEO_ID").and_then(non_empty);
        if let Some(v) = video_id.or_else(|| lookup("VIDEO_URL").and_then(non_empty)) {
            self.youtube.video = Some(v);
        }
        if let Some(v) = lookup("BOT_NAME") {
            self.bot.name = v;
        }
        if let Some(v) = lookup("OVERLAY_PATH") {
            self.bot.overlay_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TONE_PRESET") {
            self.bot.tone = Tone::parse(&v);
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.llm.model = non_empty(v);
        }
        if let Some(v) = lookup("OLLAMA_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("ONLY_WHEN_MENTIONED") {
            self.rate_limit.only_when_mentioned = parse_flag(&v);
        }
        if let Some(v) = lookup("RESPONSE_COOLDOWN_SEC") {
            self.rate_limit.cooldown_secs = parse_number("RESPONSE_COOLDOWN_SEC", &v)?;
        }
        if let Some(v) = lookup("PER_USER_COOLDOWN_SEC") {
            self.rate_limit.per_user_cooldown_secs = parse_number("PER_USER_COOLDOWN_SEC", &v)?;
        }
        if let Some(v) = lookup("RESPONSE_RANDOM_RATIO") {
            self.rate_limit.random_ratio = parse_number("RESPONSE_RANDOM_RATIO", &v)?;
        }
        if let Some(v) = lookup("TTS_ENABLED") {
            self.tts.enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("TTS_VOICE") {
            self.tts.voice = non_empty(v);
        }
        if let Some(v) = lookup("TTS_RATE") {
            self.tts.rate = non_empty(v);
        }
        if let Some(v) = lookup("TTS_TIMEOUT_SEC") {
            self.tts.timeout_secs = parse_number("TTS_TIMEOUT_SEC", &v)?;
        }
        if let Some(v) = lookup("MIN_MESSAGE_LEN") {
            self.filter.min_message_len = parse_number("MIN_MESSAGE_LEN", &v)?;
        }
        if let Some(v) = lookup("MAX_MESSAGE_LEN") {
            self.filter.max_message_len = parse_number("MAX_MESSAGE_LEN", &v)?;
        }
        if let Some(v) = lookup("IGNORED_PREFIXES") {
            self.filter.ignored_prefixes = split_list(&v);
        }
        if let Some(v) = lookup("IGNORED_WORDS") {
            self.filter.ignored_words = split_list(&v);
        }
        if let Some(v) = lookup("STRIP_URLS") {
            self.filter.strip_urls = parse_flag(&v);
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.youtube.api_key = self.youtube.api_key.trim().to_string();
        self.youtube.live_chat_id = self.youtube.live_chat_id.take().and_then(non_empty);
        self.youtube.video = self.youtube.video.take().and_then(non_empty);

        let ratio = self.rate_limit.random_ratio;
        if !(0.0..=1.0).contains(&ratio) || ratio.is_nan() {
            let clamped = if ratio.is_nan() { 1.0 } else { ratio.clamp(0.0, 1.0) };
            warn!("random_ratio {} out of range, using {}", ratio, clamped);
            self.rate_limit.random_ratio = clamped;
        }
        self.filter.ignored_words = self
            .filter
            .ignored_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
    }

    /// Startup checks that must pass before the poll loop is entered.
    pub fn validate(&self) -> Result<()> {
        if self.youtube.api_key.is_empty() {
            anyhow::bail!("A YouTube API key is required (youtube.api_key or YOUTUBE_API_KEY)");
        }
        if self.youtube.live_chat_id.is_none() && self.youtube.video.is_none() {
            anyhow::bail!(
                "A live chat id is required (youtube.live_chat_id / LIVE_CHAT_ID), \
                 or a video to resolve it from (youtube.video / VIDEO_ID)"
            );
        }
        if self.filter.min_message_len > self.filter.max_message_len {
            anyhow::bail!(
                "filter.min_message_len ({}) is greater than filter.max_message_len ({})",
                self.filter.min_message_len,
                self.filter.max_message_len
            );
        }
        Ok(())
    }
}
