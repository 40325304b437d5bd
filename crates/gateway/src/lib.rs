//! HTTP gateway for threadkeeper.
//!
//! Receives Slack Events API callbacks on `/slack/events` and hands them to
//! the [`ConversationHandler`]. Slack expects an answer within three
//! seconds, so callbacks are acknowledged first and handled on a spawned
//! task.
//!
//! Built on Axum.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use threadkeeper_agent::ConversationHandler;
use threadkeeper_channels::events::{self, EventCallback, EventEnvelope, SlackEvent};
use tracing::{debug, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub handler: Arc<ConversationHandler>,
    /// Slack signing secret. Without it requests are accepted unsigned.
    pub signing_secret: Option<String>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/slack/events", post(slack_events_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: SharedState, host: &str, port: u16) -> std::io::Result<()> {
    if state.signing_secret.is_none() {
        warn!("slack.signing_secret is not set; Slack requests will not be verified");
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening for Slack events");
    axum::serve(listener, build_router(state)).await
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ChallengeResponse {
    challenge: String,
}

async fn slack_events_handler(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = &state.signing_secret {
        if let Err(status) = verify_request(secret, &headers, &body) {
            return status.into_response();
        }
    }

    let envelope = match events::parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Rejected Slack payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => Json(ChallengeResponse { challenge }).into_response(),
        EventEnvelope::EventCallback(callback) => {
            if let Some(retry) = headers.get(events::RETRY_NUM_HEADER) {
                debug!(retry = ?retry, event_id = %callback.event_id, "Ignoring Slack retry");
                return StatusCode::OK.into_response();
            }
            let handler = state.handler.clone();
            tokio::spawn(async move { handle_callback(&handler, callback).await });
            StatusCode::OK.into_response()
        }
        EventEnvelope::Unsupported => StatusCode::OK.into_response(),
    }
}

fn verify_request(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
    let (Some(timestamp), Some(signature)) = (
        header_str(headers, events::TIMESTAMP_HEADER),
        header_str(headers, events::SIGNATURE_HEADER),
    ) else {
        warn!("Slack request without signature headers");
        return Err(StatusCode::UNAUTHORIZED);
    };

    events::verify_signature(secret, timestamp, body, signature, chrono::Utc::now().timestamp()).map_err(|e| {
        warn!(error = %e, "Slack signature check failed");
        StatusCode::UNAUTHORIZED
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn handle_callback(handler: &ConversationHandler, callback: EventCallback) {
    let bot_user_id = callback.bot_user_id().map(str::to_string);
    match callback.event {
        SlackEvent::Message(message) => handler.on_message(&message, bot_user_id.as_deref()).await,
        SlackEvent::AppMention(message) => handler.on_mention(&message).await,
        SlackEvent::Other => debug!(event_id = %callback.event_id, "Ignoring unsubscribed event type"),
    }
}
