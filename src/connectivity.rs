//! Connectivity gate: block the calling worker until the network is reachable.
//!
//! The gate never fails, it only delays. Backoff doubles per failed attempt
//! and is capped so a long outage does not turn into an hour-long sleep, and
//! a flapping link does not busy-spin.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ConnectivityConfig;
use crate::report;

#[async_trait]
pub trait Reachability: Send + Sync {
    /// One reachability attempt; true means the network is usable right now
    async fn probe(&self) -> bool;
}

/// Real prober: a plain TCP connect to any of the configured hosts
pub struct TcpReachability {
    hosts: Vec<String>,
    probe_timeout: Duration,
}

impl TcpReachability {
    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self {
            hosts: config.hosts.clone(),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }
}

#[async_trait]
impl Reachability for TcpReachability {
    async fn probe(&self) -> bool {
        for host in &self.hosts {
            if let Ok(Ok(_)) = timeout(self.probe_timeout, TcpStream::connect(host)).await {
                return true;
            }
        }
        false
    }
}

/// Blocks until a probe succeeds. Returns the number of attempts made
/// (1 when the first probe already succeeds).
pub async fn wait_until_connected<G: Reachability>(
    worker_id: usize,
    gate: &G,
    config: &ConnectivityConfig,
) -> u32 {
    let mut attempts = 0u32;
    let mut delay = config.base_delay_ms;

    loop {
        attempts += 1;
        if gate.probe().await {
            if attempts > 1 {
                report::status(
                    &format!("Worker {} - connection restored after {} attempts", worker_id, attempts),
                    "🌐",
                );
            }
            return attempts;
        }

        report::status(
            &format!(
                "Worker {} - no connection (attempt {}), retrying in {}ms...",
                worker_id, attempts, delay
            ),
            "🌐",
        );
        tokio::time::sleep(Duration::from_millis(delay)).await;
        delay = next_delay(delay, config.max_delay_ms);
    }
}

/// Doubling backoff with a hard ceiling
fn next_delay(current_ms: u64, max_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(max_ms)
}
