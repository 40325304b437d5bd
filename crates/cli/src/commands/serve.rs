//! `threadkeeper serve`: start the Slack Events API endpoint.

use super::bootstrap::{self, BoxError};
use std::sync::Arc;
use threadkeeper_core::VectorStore;
use threadkeeper_gateway::GatewayState;
use tracing::info;

pub async fn run(port_override: Option<u16>) -> Result<(), BoxError> {
    let config = bootstrap::load_config(port_override)?;
    let runtime = bootstrap::build_runtime(config)?;

    let slack = runtime
        .slack
        .clone()
        .ok_or("slack.bot_token is not set; the server cannot reply without it")?;
    let identity = slack.auth_test().await.map_err(|e| format!("Slack auth.test failed: {e}"))?;
    info!(user = %identity.user, team = %identity.team, "Authenticated with Slack");

    // A store we cannot reach at startup is fatal; a failed backfill is not.
    if runtime
        .memory
        .initialize(runtime.transport.clone())
        .await
        .map_err(|e| format!("Vector store unavailable: {e}"))?
        .is_some()
    {
        info!("New index created, backfilling channel history in the background");
    }

    let state = Arc::new(GatewayState {
        handler: Arc::new(runtime.handler()),
        signing_secret: runtime.config.slack.signing_secret.clone().filter(|s| !s.is_empty()),
    });

    println!("threadkeeper gateway");
    println!("   Listening: {}:{}", runtime.config.gateway.host, runtime.config.gateway.port);
    println!("   Model:     {}", runtime.config.default_model);
    println!("   Memory:    {} ({})", runtime.config.memory.index_name, runtime.store.name());

    threadkeeper_gateway::serve(state, &runtime.config.gateway.host, runtime.config.gateway.port).await?;
    Ok(())
}
