//! CLI for the retryq request queue.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retryq_core::config;
use retryq_core::queue::SqliteQueue;

use commands::{run_clear, run_drain, run_enqueue, run_remove, run_send, run_status};

/// Top-level CLI for retryq.
#[derive(Debug, Parser)]
#[command(name = "retryq")]
#[command(about = "retryq: persisted request queue with bounded retries", long_about = None)]
pub struct Cli {
    /// API base URL (overrides `endpoint` in config.toml).
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a command for later delivery.
    Enqueue {
        /// Command name, e.g. AddComment.
        command: String,
        /// JSON parameters.
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Send a command now and print the response (offline on failure).
    Send {
        /// Command name, e.g. OpenReport.
        command: String,
        /// JSON parameters.
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Show queued requests and their retry counts.
    Status,

    /// Remove a queued request by ID.
    Remove {
        /// Request identifier.
        id: i64,
    },

    /// Remove every queued request.
    Clear,

    /// Deliver queued requests until the queue is empty or the pass limit is hit.
    Drain {
        /// Attempt up to N distinct requests at once (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Stop after this many passes.
        #[arg(long, default_value = "20", value_name = "N")]
        passes: u32,
    },
}

pub(crate) fn parse_data(data: &str) -> Result<serde_json::Value> {
    serde_json::from_str(data).with_context(|| format!("--data is not valid JSON: {}", data))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let queue = SqliteQueue::open_default().await?;
        let endpoint = cli.endpoint.as_deref();

        match cli.command {
            CliCommand::Enqueue { command, data } => run_enqueue(&queue, &command, &data).await?,
            CliCommand::Send { command, data } => {
                run_send(queue, &cfg, endpoint, &command, &data).await?
            }
            CliCommand::Status => run_status(&queue).await?,
            CliCommand::Remove { id } => run_remove(&queue, id).await?,
            CliCommand::Clear => run_clear(&queue).await?,
            CliCommand::Drain { jobs, passes } => {
                run_drain(queue, &cfg, endpoint, jobs, passes).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
