//! `retryq clear` – drop every queued request.

use anyhow::Result;
use retryq_core::queue::{RequestQueue, SqliteQueue};

pub async fn run_clear(queue: &SqliteQueue) -> Result<()> {
    let n = queue.clear().await?;
    println!("Removed {n} request(s)");
    Ok(())
}
