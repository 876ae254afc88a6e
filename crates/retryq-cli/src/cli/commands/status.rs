//! `retryq status` – list queued requests.

use anyhow::Result;
use retryq_core::queue::{RequestQueue, SqliteQueue};

pub async fn run_status(queue: &SqliteQueue) -> Result<()> {
    let pending = queue.list_pending().await?;
    if pending.is_empty() {
        println!("No queued requests.");
    } else {
        println!("{:<6} {:<8} {}", "ID", "RETRIES", "COMMAND");
        for r in pending {
            println!("{:<6} {:<8} {}", r.id, r.retry_count, r.command);
        }
    }
    Ok(())
}
