//! `retryq remove <id>` – drop one queued request.

use anyhow::Result;
use retryq_core::queue::{RequestQueue, SqliteQueue};

pub async fn run_remove(queue: &SqliteQueue, id: i64) -> Result<()> {
    if queue.get(id).await?.is_none() {
        println!("No queued request {id}");
        return Ok(());
    }
    queue.remove(id).await?;
    println!("Removed request {id}");
    Ok(())
}
