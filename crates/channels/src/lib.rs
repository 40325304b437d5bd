//! Slack integration for threadkeeper.
//!
//! - **slack**: Web API client, the [`ChatTransport`](threadkeeper_core::ChatTransport)
//!   the assistant reads threads and posts replies through
//! - **events**: Events API payloads and request signature checks

pub mod events;
pub mod slack;

pub use events::{EventCallback, EventEnvelope, SlackEvent, parse_envelope, verify_signature};
pub use slack::{AuthIdentity, SlackClient};
