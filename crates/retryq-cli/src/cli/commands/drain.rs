//! `retryq drain` – deliver queued requests.

use anyhow::Result;
use retryq_core::config::RetryqConfig;
use retryq_core::network::{HttpTransport, Network};
use retryq_core::queue::SqliteQueue;
use retryq_core::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

pub async fn run_drain(
    queue: SqliteQueue,
    cfg: &RetryqConfig,
    endpoint: Option<&str>,
    jobs: Option<usize>,
    passes: u32,
) -> Result<()> {
    let transport = Arc::new(HttpTransport::from_config(cfg, endpoint)?);
    let (fault_tx, mut fault_rx) = tokio::sync::mpsc::unbounded_channel();
    let net = Network::with_fault_channel(
        Arc::new(queue),
        transport,
        RetryPolicy::from_config(cfg),
        fault_tx,
    )
    .drain_concurrency(jobs.unwrap_or(cfg.drain_concurrency))
    .claim_lease(Duration::from_secs(cfg.claim_lease_secs));

    let summary = net.drain(passes).await?;
    drop(net);

    while let Some(fault) = fault_rx.recv().await {
        eprintln!("warning: {}", fault);
    }

    if summary.delivered == 0 && summary.abandoned == 0 && summary.remaining == 0 {
        println!("No queued requests.");
    } else {
        println!(
            "Delivered {}, abandoned {}, still queued {} ({} pass(es))",
            summary.delivered, summary.abandoned, summary.remaining, summary.passes
        );
    }
    Ok(())
}
