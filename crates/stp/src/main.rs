use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stp::daemon::Daemon;
use stp_models::MessageId;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stp",
    about = "STP inbound pipeline - turns staged trade messages into booked trade records"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/stp.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll for unparsed messages until interrupted
    Run,
    /// Process a single batch and print the summary
    Once,
    /// Process one message by id and print the outcome
    Message {
        #[arg(long)]
        id: i64,
    },
    /// Stage a raw message from a file
    Stage {
        /// Origin of the message (e.g., FIX, EMAIL, FILE)
        #[arg(long)]
        source: String,
        #[arg(long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = stp::load_config(&cli.config)?;
    let pipeline = stp::build_pipeline(&config)?;

    match cli.command {
        Command::Run => {
            let daemon = Daemon::new(
                pipeline.orchestrator,
                Duration::from_secs(config.pipeline.poll_interval_seconds),
            );
            let cancel = daemon.cancel_token();

            // Handle shutdown signals
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received shutdown signal");
                cancel.cancel();
            });

            daemon.run().await;
        }
        Command::Once => {
            let orchestrator = pipeline.orchestrator;
            let summary = tokio::task::spawn_blocking(move || orchestrator.process_pending_messages())
                .await
                .context("Batch task panicked")?
                .context("Failed to fetch pending messages")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Message { id } => {
            let outcome = pipeline
                .orchestrator
                .process_message(MessageId(id))
                .with_context(|| format!("Failed to process message {id}"))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Stage { source, file } => {
            let payload = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read message file: {file}"))?;
            let id = pipeline
                .messages
                .stage(&source, &payload)
                .context("Failed to stage message")?;
            println!("{id}");
        }
    }

    Ok(())
}
