//! threadkeeper CLI: the main entry point.
//!
//! Commands:
//! - `serve`    : Start the Slack Events endpoint (backfills a new index first)
//! - `ask`      : Answer a single question from memory, without posting to Slack
//! - `backfill` : Load channel history into memory
//! - `doctor`   : Diagnose configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "threadkeeper",
    about = "threadkeeper: a Slack assistant that remembers your threads",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "THREADKEEPER_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Slack Events API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question and print the answer
    Ask {
        /// Channel the question is asked in
        #[arg(short, long)]
        channel: String,

        /// Thread timestamp; enables thread lookup
        #[arg(short, long)]
        thread_ts: Option<String>,

        message: String,
    },

    /// Embed the history of every joined channel
    Backfill,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            channel,
            thread_ts,
            message,
        } => commands::ask::run(channel, thread_ts, message).await?,
        Commands::Backfill => commands::backfill::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
