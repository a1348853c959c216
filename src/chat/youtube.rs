use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{ChatMessage, ChatPage, ChatSource, MessageKind};
use crate::config::YouTubeConfig;

const USER_AGENT: &str = concat!("streambot/", env!("CARGO_PKG_VERSION"));
const TEXT_MESSAGE_EVENT: &str = "textMessageEvent";
const DEFAULT_AUTHOR: &str = "viewer";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    polling_interval_millis: Option<u64>,
    #[serde(default)]
    items: Vec<LiveChatItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LiveChatItem {
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    author_details: AuthorDetails,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    display_message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AuthorDetails {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoList {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Video {
    #[serde(default)]
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    #[serde(default)]
    active_live_chat_id: Option<String>,
}

impl From<LiveChatItem> for ChatMessage {
    fn from(item: LiveChatItem) -> Self {
        let kind = match item.snippet.kind {
            Some(k) if k == TEXT_MESSAGE_EVENT => MessageKind::Text,
            Some(k) => MessageKind::Other(k),
            None => MessageKind::Other(String::new()),
        };
        ChatMessage {
            author: item
                .author_details
                .display_name
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            text: item
                .snippet
                .display_message
                .unwrap_or_default()
                .trim()
                .to_string(),
            kind,
        }
    }
}

impl From<LiveChatMessageList> for ChatPage {
    fn from(list: LiveChatMessageList) -> Self {
        ChatPage {
            messages: list.items.into_iter().map(ChatMessage::from).collect(),
            next_page_token: list.next_page_token,
            polling_interval_ms: list.polling_interval_millis,
        }
    }
}

/// YouTube Data API v3 live chat client.
pub struct YouTubeChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    live_chat_id: String,
}

/// Build the HTTP client shared by the chat calls; every request is bounded.
fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build YouTube HTTP client")
}

impl YouTubeChat {
    pub fn new(config: &YouTubeConfig, live_chat_id: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            live_chat_id,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        client: &reqwest::Client,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("YouTube API error ({}): {}", status, error_body);
        }

        response
            .json()
            .await
            .context("Failed to parse YouTube response")
    }

    /// One-shot lookup of the active live chat id for a video.
    pub async fn resolve_live_chat_id(config: &YouTubeConfig, video_id: &str) -> Result<String> {
        let client = http_client(config.timeout_secs)?;
        let url = format!("{}/videos", config.base_url.trim_end_matches('/'));

        debug!("Resolving live chat id for video {}", video_id);

        let list: VideoList = Self::get_json(
            &client,
            &url,
            &[
                ("part", "liveStreamingDetails"),
                ("id", video_id),
                ("key", config.api_key.as_str()),
            ],
        )
        .await?;

        let video = list
            .items
            .into_iter()
            .next()
            .with_context(|| format!("No video found for id {}", video_id))?;

        video
            .live_streaming_details
            .and_then(|d| d.active_live_chat_id)
            .filter(|id| !id.is_empty())
            .with_context(|| format!("Video {} has no active live chat; is the stream live?", video_id))
    }
}

#[async_trait]
impl ChatSource for YouTubeChat {
    async fn fetch(&self, page_token: Option<&str>) -> Result<ChatPage> {
        let url = format!("{}/liveChatMessages", self.base_url);
        let mut query = vec![
            ("key", self.api_key.as_str()),
            ("liveChatId", self.live_chat_id.as_str()),
            ("part", "snippet,authorDetails"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let list: LiveChatMessageList = Self::get_json(&self.client, &url, &query).await?;
        debug!(
            "Fetched {} chat item(s), next token present: {}",
            list.items.len(),
            list.next_page_token.is_some()
        );
        Ok(list.into())
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Pull a video id out of a bare id or a youtu.be / youtube.com URL
/// (`watch?v=`, `/live/<id>`, `/shorts/<id>`).
pub fn extract_video_id(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.len() >= 6 && value.chars().all(is_id_char) {
        return Some(value.to_string());
    }

    let url = Url::parse(value).ok()?;
    let host = url.host_str()?;

    if host == "youtu.be" || host == "www.youtu.be" {
        return url
            .path_segments()?
            .find(|s| !s.is_empty())
            .map(str::to_string);
    }

    if host.contains("youtube.com") {
        if let Some((_, v)) = url.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
            return Some(v.into_owned());
        }
        let parts: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if parts.len() >= 2 && (parts[0] == "shorts" || parts[0] == "live") {
            return Some(parts[1].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_id() {
        assert_eq!(extract_video_id(" dQw4w9WgXcQ ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("abc"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_extract_from_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=x").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/live/LiveId123").as_deref(),
            Some("LiveId123")
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/shorts/Short987").as_deref(),
            Some("Short987")
        );
        assert_eq!(extract_video_id("https://example.com/watch?v=nope"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel"), None);
    }

    #[test]
    fn test_page_mapping() {
        let list: LiveChatMessageList = serde_json::from_str(
            r#"{
                "nextPageToken": "tok-2",
                "pollingIntervalMillis": 3000,
                "items": [
                    {
                        "snippet": {"type": "textMessageEvent", "displayMessage": "  AI hello "},
                        "authorDetails": {"displayName": "Kim"}
                    },
                    {
                        "snippet": {"type": "superChatEvent", "displayMessage": "thanks"},
                        "authorDetails": {"displayName": "Lee"}
                    },
                    {"snippet": {"type": "textMessageEvent"}}
                ]
            }"#,
        )
        .unwrap();

        let page = ChatPage::from(list);
        assert_eq!(page.next_page_token.as_deref(), Some("tok-2"));
        assert_eq!(page.polling_interval_ms, Some(3000));
        assert_eq!(page.messages.len(), 3);
        assert_eq!(page.messages[0].author, "Kim");
        assert_eq!(page.messages[0].text, "AI hello");
        assert_eq!(page.messages[0].kind, MessageKind::Text);
        assert_eq!(
            page.messages[1].kind,
            MessageKind::Other("superChatEvent".to_string())
        );
        assert_eq!(page.messages[2].author, DEFAULT_AUTHOR);
        assert!(page.messages[2].text.is_empty());
    }

    #[test]
    fn test_empty_response_is_empty_page() {
        let list: LiveChatMessageList = serde_json::from_str("{}").unwrap();
        let page = ChatPage::from(list);
        assert!(page.messages.is_empty());
        assert!(page.next_page_token.is_none());
        assert!(page.polling_interval_ms.is_none());
    }
}
