//! Slack Events API: request signatures and payload parsing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use threadkeeper_core::chat::PlatformMessage;
use threadkeeper_core::error::ChannelError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";

/// Requests older (or newer) than this are rejected as replays.
pub const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

const SIGNATURE_VERSION: &str = "v0";

/// Compute Slack's `v0=` signature for a request body.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let digest = base_string_mac(secret, timestamp, body).finalize().into_bytes();
    format!("{SIGNATURE_VERSION}={}", hex::encode(digest))
}

/// HMAC over Slack's `v0:{timestamp}:{body}` base string.
fn base_string_mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    mac
}

/// Check a request against the signing secret.
///
/// `now` is the current unix time in seconds. Comparison is constant-time.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), ChannelError> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| ChannelError::SignatureMismatch(format!("bad timestamp {timestamp:?}")))?;
    if (now - sent_at).abs() > MAX_REQUEST_AGE_SECS {
        return Err(ChannelError::SignatureMismatch("request timestamp outside the replay window".into()));
    }

    let provided = signature
        .strip_prefix("v0=")
        .ok_or_else(|| ChannelError::SignatureMismatch("unsupported signature version".into()))?;
    let provided = hex::decode(provided).map_err(|_| ChannelError::SignatureMismatch("signature is not hex".into()))?;

    base_string_mac(secret, timestamp, body)
        .verify_slice(&provided)
        .map_err(|_| ChannelError::SignatureMismatch("digest does not match".into()))
}

/// Top-level Events API payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Sent once when the request URL is configured.
    UrlVerification { challenge: String },
    EventCallback(EventCallback),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventCallback {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub event_id: String,
    pub event: SlackEvent,
    #[serde(default)]
    pub authorizations: Vec<Authorization>,
}

impl EventCallback {
    /// The bot's own user id, used to spot mentions in plain messages.
    pub fn bot_user_id(&self) -> Option<&str> {
        self.authorizations
            .first()
            .map(|a| a.user_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub user_id: String,
}

/// The events we subscribe to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    Message(PlatformMessage),
    AppMention(PlatformMessage),
    #[serde(other)]
    Other,
}

pub fn parse_envelope(body: &[u8]) -> Result<EventEnvelope, ChannelError> {
    serde_json::from_slice(body).map_err(|e| ChannelError::InvalidPayload(e.to_string()))
}
