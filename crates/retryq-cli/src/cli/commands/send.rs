//! `retryq send <command>` – interactive request; prints the response.

use anyhow::Result;
use retryq_core::config::RetryqConfig;
use retryq_core::network::{HttpTransport, Network};
use retryq_core::queue::SqliteQueue;
use retryq_core::retry::RetryPolicy;
use std::sync::Arc;

use crate::cli::parse_data;

pub async fn run_send(
    queue: SqliteQueue,
    cfg: &RetryqConfig,
    endpoint: Option<&str>,
    command: &str,
    data: &str,
) -> Result<()> {
    let data = parse_data(data)?;
    let transport = Arc::new(HttpTransport::from_config(cfg, endpoint)?);
    let net = Network::new(Arc::new(queue), transport, RetryPolicy::from_config(cfg));

    let response = net.make_request(command, data).wait().await;
    if response.is_offline() {
        println!("offline (jsonCode {})", response.json_code);
    } else {
        println!("{}", serde_json::to_string_pretty(&response.payload)?);
    }
    Ok(())
}
