//! `threadkeeper backfill`: embed the history of every joined channel.

use super::bootstrap::{self, BoxError};

pub async fn run() -> Result<(), BoxError> {
    let config = bootstrap::load_config(None)?;
    let runtime = bootstrap::build_runtime(config)?;
    let slack = runtime.slack.clone().ok_or("slack.bot_token is not set")?;

    if runtime.memory.ensure_index().await? {
        println!("Created index '{}'", runtime.config.memory.index_name);
    }

    let report = runtime.memory.backfill(slack.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failures > 0 {
        println!("{} channel(s) failed; see the log for details", report.failures);
    }
    Ok(())
}
