mod agent;
mod bot;
mod chat;
mod config;
mod llm;
mod pipeline;
mod sinks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::Responder;
use crate::bot::Dispatcher;
use crate::chat::youtube::{extract_video_id, YouTubeChat};
use crate::config::{Config, YouTubeConfig};
use crate::llm::{Generator, OllamaClient};
use crate::pipeline::Intake;
use crate::sinks::overlay::OverlaySink;
use crate::sinks::speech::SpeechSink;
use crate::sinks::Sink;

const USAGE: &str = "usage: streambot [config.toml]\n       streambot resolve-chat-id <video-id-or-url> [config.toml]";

async fn resolve_chat_id(youtube: &YouTubeConfig, video: &str) -> Result<String> {
    let video_id = extract_video_id(video)
        .with_context(|| format!("Could not find a video id in {:?}", video))?;
    YouTubeChat::resolve_live_chat_id(youtube, &video_id).await
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env never overrides variables already set in the environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,streambot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let first = args.next();
    let resolve_target = match first.as_deref() {
        Some("resolve-chat-id") => Some(args.next().context(USAGE)?),
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            return Ok(());
        }
        _ => None,
    };
    let config_path = if resolve_target.is_some() {
        args.next()
    } else {
        first
    }
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if let Some(video) = resolve_target {
        if config.youtube.api_key.is_empty() {
            anyhow::bail!("A YouTube API key is required (youtube.api_key or YOUTUBE_API_KEY)");
        }
        println!("{}", resolve_chat_id(&config.youtube, &video).await?);
        return Ok(());
    }

    config.validate()?;

    let live_chat_id = match config.youtube.live_chat_id.clone() {
        Some(id) => id,
        None => {
            let video = config
                .youtube
                .video
                .clone()
                .context("A live chat id or a video is required")?;
            let id = resolve_chat_id(&config.youtube, &video)
                .await
                .context("Failed to resolve the live chat id")?;
            info!("Resolved live chat id {} from {}", id, video);
            id
        }
    };

    info!("Configuration loaded successfully");
    info!("  Bot name: {}", config.bot.name);
    info!("  Tone: {}", config.bot.tone);
    info!("  Overlay: {}", config.bot.overlay_path.display());
    info!("  Speech: {}", if config.tts.enabled { "on" } else { "off" });
    info!(
        "  Cooldowns: global {}s, per author {}s",
        config.rate_limit.cooldown_secs, config.rate_limit.per_user_cooldown_secs
    );

    let source = Arc::new(YouTubeChat::new(&config.youtube, live_chat_id)?);

    let generator: Option<Arc<dyn Generator>> = match &config.llm.model {
        Some(model) => {
            let client = OllamaClient::new(&config.llm, model.clone())?;
            info!("  Model: {} via {}", client.model(), config.llm.base_url);
            Some(Arc::new(client) as Arc<dyn Generator>)
        }
        None => {
            info!("  Model: none, using template replies");
            None
        }
    };
    let responder = Responder::new(
        config.bot.name.clone(),
        config.bot.tone,
        generator,
        Duration::from_secs(config.llm.timeout_secs),
    );

    let mut sinks: Vec<Arc<dyn Sink>> =
        vec![Arc::new(OverlaySink::new(&config.bot.overlay_path))];
    if config.tts.enabled {
        sinks.push(Arc::new(SpeechSink::new(&config.tts)));
    }

    let mut dispatcher = Dispatcher::new(source, Intake::new(&config), responder, sinks);

    info!("Bot is starting...");
    tokio::select! {
        result = dispatcher.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
    }

    Ok(())
}
