//! BalanceProbe: one bounded-concurrency batch of balance queries per candidate.
//!
//! Every address gets its own task under a shared semaphore so a batch never
//! holds more than `max_inflight` requests against the external APIs. A query
//! that exhausts its retries resolves to UNCERTAIN, never to a confirmed zero.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::config::{Config, Endpoint, ProbeConfig, ResponseFormat};
use crate::error::Result;
use crate::report;
use crate::types::{BalanceResult, Candidate, CandidateResult, Chain};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,

    #[error("transient failure: {0}")]
    Transient(String),
}

/// External boundary: one balance query for one address.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait BalanceBackend: Send + Sync {
    async fn fetch(&self, chain: Chain, address: &str) -> std::result::Result<u128, ProbeError>;
}

/// Production backend querying the configured HTTP endpoints
pub struct HttpBackend {
    client: Client,
    endpoints: Vec<Endpoint>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.probe.timeout_ms))
            .user_agent(concat!("seedscan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
        })
    }
}

#[async_trait]
impl BalanceBackend for HttpBackend {
    async fn fetch(&self, chain: Chain, address: &str) -> std::result::Result<u128, ProbeError> {
        let endpoint = self
            .endpoints
            .iter()
            .find(|e| e.chain == chain)
            .ok_or_else(|| {
                ProbeError::Transient(format!("no endpoint for chain '{}'", chain.as_str()))
            })?;

        let url = endpoint.url_template.replace("{address}", address);
        let response = self.client.get(&url).send().await.map_err(classify)?;
        if !response.status().is_success() {
            return Err(ProbeError::Transient(format!("HTTP {}", response.status())));
        }
        let body = response.text().await.map_err(classify)?;
        parse_balance(&body, endpoint.response)
    }
}

fn classify(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Transient(err.to_string())
    }
}

fn parse_balance(body: &str, format: ResponseFormat) -> std::result::Result<u128, ProbeError> {
    match format {
        ResponseFormat::Plain => body
            .trim()
            .parse::<u128>()
            .map_err(|e| ProbeError::Transient(format!("unparseable balance body: {}", e))),
        ResponseFormat::JsonResult => {
            let value: serde_json::Value = serde_json::from_str(body)
                .map_err(|e| ProbeError::Transient(format!("invalid JSON body: {}", e)))?;
            match &value["result"] {
                serde_json::Value::String(s) => s.trim().parse::<u128>().map_err(|e| {
                    ProbeError::Transient(format!("unparseable result field: {}", e))
                }),
                serde_json::Value::Number(n) => n
                    .as_u64()
                    .map(u128::from)
                    .ok_or_else(|| ProbeError::Transient("negative result field".to_string())),
                other => Err(ProbeError::Transient(format!(
                    "unexpected result field: {}",
                    other
                ))),
            }
        }
    }
}

pub struct BalanceProbe<B> {
    backend: Arc<B>,
    config: ProbeConfig,
    limiter: Arc<Semaphore>,
}

impl<B: BalanceBackend + 'static> BalanceProbe<B> {
    pub fn new(backend: Arc<B>, config: ProbeConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_inflight));
        Self { backend, config, limiter }
    }

    /// Query every address of the candidate. Never fails: individual probe
    /// failures degrade that address to UNCERTAIN and the batch carries on.
    /// Results come back in address order regardless of completion order.
    pub async fn check(&self, candidate: Candidate) -> CandidateResult {
        let count = candidate.addresses.len();
        let mut tasks = Vec::with_capacity(count);

        for (index, derived) in candidate.addresses.iter().enumerate() {
            let backend = self.backend.clone();
            let limiter = self.limiter.clone();
            let config = self.config.clone();
            let chain = derived.chain;
            let address = derived.address.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    // Semaphore is never closed; treat it as a failed probe anyway
                    Err(_) => return (index, BalanceResult::uncertain(address, chain)),
                };
                (index, fetch_with_retry(backend.as_ref(), chain, address, &config).await)
            }));
        }

        let mut slots: Vec<Option<BalanceResult>> = (0..count).map(|_| None).collect();
        for task in tasks {
            if let Ok((index, result)) = task.await {
                slots[index] = Some(result);
            }
        }

        // A panicked task leaves a hole; the address still resolves, as UNCERTAIN
        let balances = slots
            .into_iter()
            .zip(candidate.addresses.iter())
            .map(|(slot, derived)| {
                slot.unwrap_or_else(|| {
                    BalanceResult::uncertain(derived.address.clone(), derived.chain)
                })
            })
            .collect();

        CandidateResult::new(candidate, balances)
    }
}

/// Per-attempt timeout, doubling backoff between attempts.
/// `max_retries` exhausted means UNCERTAIN, not zero.
async fn fetch_with_retry<B: BalanceBackend>(
    backend: &B,
    chain: Chain,
    address: String,
    config: &ProbeConfig,
) -> BalanceResult {
    let attempts = config.max_retries + 1;
    let mut delay = config.retry_delay_ms;

    for attempt in 1..=attempts {
        let outcome = timeout(
            Duration::from_millis(config.timeout_ms),
            backend.fetch(chain, &address),
        )
        .await;

        match outcome {
            Ok(Ok(amount)) => return BalanceResult::confirmed(address, chain, amount),
            Ok(Err(_)) | Err(_) => {}
        }

        if attempt < attempts {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = delay.saturating_mul(2);
        }
    }

    report::status(
        &format!(
            "Balance for {} ({}) unresolved after {} attempts",
            address,
            chain.as_str(),
            attempts
        ),
        "⚠️",
    );
    BalanceResult::uncertain(address, chain)
}
