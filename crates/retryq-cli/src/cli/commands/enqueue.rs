//! `retryq enqueue <command>` – queue a command for later delivery.

use anyhow::Result;
use retryq_core::queue::{RequestQueue, SqliteQueue};
use retryq_core::request::NewRequest;

use crate::cli::parse_data;

pub async fn run_enqueue(queue: &SqliteQueue, command: &str, data: &str) -> Result<()> {
    let data = parse_data(data)?;
    let id = queue.enqueue(NewRequest::new(command, data)).await?;
    println!("Queued request {id}: {command}");
    Ok(())
}
