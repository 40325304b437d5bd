//! ChatTransport trait: the abstraction over the chat platform.
//!
//! The transport delivers inbound messages, exposes thread and channel
//! history for retrieval and backfill, and posts the assistant's replies.
//! Field names follow Slack's event and Web API payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Subtype Slack attaches to a deletion event.
pub const SUBTYPE_MESSAGE_DELETED: &str = "message_deleted";

/// An inbound message or history entry from the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformMessage {
    #[serde(default)]
    pub text: String,

    /// Platform timestamp, unique per channel
    #[serde(default)]
    pub ts: String,

    /// Thread root timestamp when the message is inside a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,

    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub user: String,

    /// Marks system, edit and delete events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    /// Set when another bot (or this one) posted the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,

    /// The message as it was before a deletion or edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_message: Option<PreviousMessage>,
}

/// The snapshot Slack includes with `message_deleted` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviousMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl PlatformMessage {
    pub fn new(channel: impl Into<String>, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user: user.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = ts.into();
        self
    }

    pub fn with_thread_ts(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn is_deletion(&self) -> bool {
        self.subtype.as_deref() == Some(SUBTYPE_MESSAGE_DELETED)
    }

    /// The thread root, ignoring an empty `thread_ts`.
    pub fn thread(&self) -> Option<&str> {
        self.thread_ts.as_deref().filter(|ts| !ts.is_empty())
    }

    /// Whether the text contains a `<@USER>` tag for the given user.
    pub fn mentions(&self, user_id: &str) -> bool {
        !user_id.is_empty() && self.text.contains(&format!("<@{user_id}>"))
    }
}

/// One message of a reply thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadReply {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
}

/// A channel visible to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default)]
    pub is_member: bool,
}

/// The core ChatTransport trait.
///
/// Implementations: Slack Web API. Tests use an in-process double.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Human-readable transport name (e.g., "slack").
    fn name(&self) -> &str;

    /// All messages of the thread rooted at `ts`, root first.
    async fn fetch_thread_replies(
        &self,
        channel: &str,
        ts: &str,
    ) -> std::result::Result<Vec<ThreadReply>, ChannelError>;

    async fn list_channels(&self) -> std::result::Result<Vec<ChannelInfo>, ChannelError>;

    /// Up to `limit` messages of a channel's history, newest first.
    async fn fetch_channel_history(
        &self,
        channel: &str,
        limit: usize,
    ) -> std::result::Result<Vec<PlatformMessage>, ChannelError>;

    /// Post a message, as a thread reply when `thread_ts` is given.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;
}
