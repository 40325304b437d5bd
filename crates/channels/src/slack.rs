//! Slack Web API client.
//!
//! Implements [`ChatTransport`] over `conversations.*` and
//! `chat.postMessage`. Every Slack response carries `ok`; `ok: false`
//! becomes [`ChannelError::Api`] with Slack's error code.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use threadkeeper_config::SlackConfig;
use threadkeeper_core::chat::{ChannelInfo, ChatTransport, PlatformMessage, ThreadReply};
use threadkeeper_core::error::ChannelError;
use tracing::{debug, warn};

/// Largest page Slack serves for the conversation methods we use.
const PAGE_LIMIT: usize = 200;

/// Who the bot token belongs to, from `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    pub user_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct RepliesPage {
    #[serde(default)]
    messages: Vec<ThreadReply>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<ChannelInfo>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<PlatformMessage>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

fn next_cursor(metadata: &ResponseMetadata) -> Option<String> {
    Some(metadata.next_cursor.clone()).filter(|c| !c.is_empty())
}

/// Unwrap a Slack response body: check `ok`, then decode the rest.
pub(crate) fn into_result<T: DeserializeOwned>(method: &str, body: serde_json::Value) -> Result<T, ChannelError> {
    if !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
        let error = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown_error")
            .to_string();
        return Err(ChannelError::Api {
            method: method.to_string(),
            error,
        });
    }
    serde_json::from_value(body).map_err(|e| ChannelError::InvalidPayload(format!("{method}: {e}")))
}

/// A bot-token client for the Slack Web API.
pub struct SlackClient {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: "https://slack.com/api".into(),
            bot_token: bot_token.into(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, ChannelError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChannelError::NotConfigured("slack.bot_token is not set".into()))?;
        Ok(Self::new(token).with_api_url(&config.api_url))
    }

    /// Resolve the bot's own identity. Also the cheapest token check.
    pub async fn auth_test(&self) -> Result<AuthIdentity, ChannelError> {
        self.post("auth.test", &serde_json::json!({})).await
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T, ChannelError> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;
        self.decode(method, response).await
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T, ChannelError> {
        let response = self
            .client
            .post(format!("{}/{}", self.api_url, method))
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;
        self.decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(&self, method: &str, response: reqwest::Response) -> Result<T, ChannelError> {
        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            warn!(method, retry_after = %retry_after, "Slack rate limit hit");
            return Err(ChannelError::Api {
                method: method.to_string(),
                error: format!("ratelimited (retry after {retry_after}s)"),
            });
        }
        if !status.is_success() {
            return Err(ChannelError::Api {
                method: method.to_string(),
                error: format!("http {status}"),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {e}")))?;
        into_result(method, body)
    }
}

#[async_trait]
impl ChatTransport for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    async fn fetch_thread_replies(&self, channel: &str, ts: &str) -> Result<Vec<ThreadReply>, ChannelError> {
        let mut replies = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("ts", ts.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page: RepliesPage = self.get("conversations.replies", &query).await?;
            replies.extend(page.messages);
            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }
        debug!(channel, ts, count = replies.len(), "Fetched thread replies");
        Ok(replies)
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChannelError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page: ChannelsPage = self.get("conversations.list", &query).await?;
            channels.extend(page.channels);
            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }
        Ok(channels)
    }

    async fn fetch_channel_history(&self, channel: &str, limit: usize) -> Result<Vec<PlatformMessage>, ChannelError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        while messages.len() < limit {
            let page_size = (limit - messages.len()).min(PAGE_LIMIT);
            let mut query = vec![("channel", channel.to_string()), ("limit", page_size.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page: HistoryPage = self.get("conversations.history", &query).await?;
            messages.extend(page.messages.into_iter().map(|mut m| {
                m.channel = channel.to_string();
                m
            }));
            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }
        messages.truncate(limit);
        Ok(messages)
    }

    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = serde_json::Value::String(ts.to_string());
        }
        let _: serde_json::Value = self.post("chat.postMessage", &body).await?;
        debug!(channel, thread_ts = ?thread_ts, "Posted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_false_is_api_error() {
        let err = into_result::<serde_json::Value>(
            "conversations.history",
            serde_json::json!({"ok": false, "error": "not_in_channel"}),
        )
        .unwrap_err();
        match err {
            ChannelError::Api { method, error } => {
                assert_eq!(method, "conversations.history");
                assert_eq!(error, "not_in_channel");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_ok_is_treated_as_failure() {
        assert!(into_result::<serde_json::Value>("auth.test", serde_json::json!({})).is_err());
    }

    #[test]
    fn replies_page_parses_and_reports_cursor() {
        let page: RepliesPage = into_result(
            "conversations.replies",
            serde_json::json!({
                "ok": true,
                "messages": [
                    {"type": "message", "text": "root", "ts": "1.0", "user": "U1"},
                    {"type": "message", "text": "reply", "ts": "1.1", "thread_ts": "1.0"}
                ],
                "has_more": true,
                "response_metadata": {"next_cursor": "abc"}
            }),
        )
        .unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[1].text, "reply");
        assert_eq!(next_cursor(&page.response_metadata).as_deref(), Some("abc"));
    }

    #[test]
    fn last_page_has_no_cursor() {
        let page: ChannelsPage = into_result(
            "conversations.list",
            serde_json::json!({
                "ok": true,
                "channels": [{"id": "C1", "name": "general", "is_member": true}, {"id": "C2"}],
                "response_metadata": {"next_cursor": ""}
            }),
        )
        .unwrap();
        assert_eq!(page.channels[0], ChannelInfo { id: "C1".into(), is_member: true });
        assert!(!page.channels[1].is_member);
        assert!(next_cursor(&page.response_metadata).is_none());
    }

    #[test]
    fn history_messages_keep_thread_and_bot_markers() {
        let page: HistoryPage = into_result(
            "conversations.history",
            serde_json::json!({
                "ok": true,
                "messages": [
                    {"type": "message", "text": "hi", "ts": "2.0", "user": "U1", "thread_ts": "1.0"},
                    {"type": "message", "text": "beep", "ts": "3.0", "bot_id": "B1", "subtype": "bot_message"}
                ]
            }),
        )
        .unwrap();
        assert_eq!(page.messages[0].thread_ts.as_deref(), Some("1.0"));
        assert_eq!(page.messages[1].bot_id.as_deref(), Some("B1"));
    }

    #[test]
    fn auth_identity_parses() {
        let identity: AuthIdentity = into_result(
            "auth.test",
            serde_json::json!({"ok": true, "user_id": "UBOT", "user": "threadkeeper", "team": "Acme", "bot_id": "B9"}),
        )
        .unwrap();
        assert_eq!(identity.user_id, "UBOT");
        assert_eq!(identity.bot_id.as_deref(), Some("B9"));
    }

    #[test]
    fn from_config_requires_token() {
        let err = SlackClient::from_config(&SlackConfig::default()).err().unwrap();
        assert!(matches!(err, ChannelError::NotConfigured(_)));

        let config = SlackConfig {
            bot_token: Some("xoxb-1".into()),
            api_url: "http://localhost:9999/api/".into(),
            ..SlackConfig::default()
        };
        let client = SlackClient::from_config(&config).unwrap();
        assert_eq!(client.api_url, "http://localhost:9999/api");
        assert_eq!(client.name(), "slack");
    }
}
