//! `threadkeeper doctor`: diagnose configuration and connectivity.

use super::bootstrap::{self, BoxError};
use threadkeeper_channels::SlackClient;
use threadkeeper_config::AppConfig;
use threadkeeper_core::{Provider, VectorStore};

pub async fn run() -> Result<(), BoxError> {
    println!("threadkeeper doctor");
    println!("===================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ok  Config file found at {}", config_path.display());
    } else {
        println!("  --  No config file at {}; using defaults and environment", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ok  Configuration valid");
            config
        }
        Err(e) => {
            println!("  !!  Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and run again.");
            return Ok(());
        }
    };

    match bootstrap::build_provider(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ok  Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  !!  Provider '{}' reported unhealthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  !!  Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  !!  {e}");
            issues += 1;
        }
    }

    match bootstrap::build_vector_store(&config) {
        Ok(store) => match store.list_indexes().await {
            Ok(indexes) if indexes.contains(&config.memory.index_name) => {
                println!("  ok  Vector store '{}' has index '{}'", store.name(), config.memory.index_name);
            }
            Ok(_) => {
                println!(
                    "  --  Index '{}' does not exist yet; `serve` or `backfill` will create it",
                    config.memory.index_name
                );
            }
            Err(e) => {
                println!("  !!  Vector store '{}' unreachable: {e}", store.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  !!  {e}");
            issues += 1;
        }
    }

    match SlackClient::from_config(&config.slack) {
        Ok(client) => match client.auth_test().await {
            Ok(identity) => println!("  ok  Slack token belongs to {} ({})", identity.user, identity.team),
            Err(e) => {
                println!("  !!  Slack auth.test failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  !!  {e}");
            issues += 1;
        }
    }

    if config.slack.signing_secret.as_deref().is_none_or(str::is_empty) {
        println!("  --  No signing secret; Slack requests will not be verified");
    } else {
        println!("  ok  Signing secret configured");
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
