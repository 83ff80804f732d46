//! WorkerLoop: one independent generate → probe → record cycle, forever.
//!
//! Each worker runs on its own OS thread with its own current-thread tokio
//! runtime; the only concurrency inside a worker is the bounded probe batch.
//! The status block printed at the top of iteration k deliberately shows the
//! durations and result of iteration k-1.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ConnectivityConfig;
use crate::connectivity::{wait_until_connected, Reachability};
use crate::derive::MnemonicGenerator;
use crate::probe::{BalanceBackend, BalanceProbe};
use crate::report::{self, format_dur, FindingSink};

const STATUS_NONE: &str = "No balance found";
const STATUS_FOUND: &str = "Balance Found!";
const STATUS_GENERATION_FAILED: &str = "Generation failed";

/// Counters owned exclusively by one worker for its whole lifetime
pub struct WorkerState {
    pub worker_id: usize,
    pub iterations: u64,
    pub findings: u64,
    pub last_iter: Duration,
    pub last_probe: Duration,
    pub last_status: &'static str,
    started: Instant,
}

impl WorkerState {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            iterations: 0,
            findings: 0,
            last_iter: Duration::ZERO,
            last_probe: Duration::ZERO,
            last_status: STATUS_NONE,
            started: Instant::now(),
        }
    }

    fn record_iteration(&mut self, iter: Duration, probe: Duration, found: bool) {
        self.iterations += 1;
        self.last_iter = iter;
        self.last_probe = probe;
        if found {
            self.findings += 1;
            self.last_status = STATUS_FOUND;
        } else {
            self.last_status = STATUS_NONE;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Display snapshot, recomputed per iteration; never persisted
    pub fn snapshot(&self) -> RunStatistics {
        RunStatistics {
            worker_id: self.worker_id,
            total_runtime: self.elapsed(),
            iterations: self.iterations,
            findings: self.findings,
            last_iter: self.last_iter,
            last_probe: self.last_probe,
            last_status: self.last_status,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub worker_id: usize,
    pub total_runtime: Duration,
    pub iterations: u64,
    pub findings: u64,
    pub last_iter: Duration,
    pub last_probe: Duration,
    pub last_status: &'static str,
}

pub struct WorkerLoop<B, G> {
    state: WorkerState,
    generator: MnemonicGenerator,
    rng: StdRng,
    probe: BalanceProbe<B>,
    gate: G,
    connectivity: ConnectivityConfig,
    sink: Arc<dyn FindingSink>,
    shutdown: Arc<AtomicBool>,
}

impl<B, G> WorkerLoop<B, G>
where
    B: BalanceBackend + 'static,
    G: Reachability,
{
    pub fn new(
        worker_id: usize,
        generator: MnemonicGenerator,
        probe: BalanceProbe<B>,
        gate: G,
        connectivity: ConnectivityConfig,
        sink: Arc<dyn FindingSink>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state: WorkerState::new(worker_id),
            generator,
            rng: StdRng::from_entropy(),
            probe,
            gate,
            connectivity,
            sink,
            shutdown,
        }
    }

    pub fn into_state(self) -> WorkerState {
        self.state
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// INIT → (CHECK_CONNECTIVITY → GENERATE → PROBE → RECORD)* → STOPPED.
    /// The shutdown flag is observed only at state boundaries; an in-flight
    /// probe batch always runs to completion first.
    pub async fn run(mut self) -> WorkerState {
        let id = self.state.worker_id;
        report::status(
            &format!("Worker {} starting continuous wallet generation and balance checks... (Ctrl+C to stop)", id),
            "🔁",
        );

        loop {
            if self.stopping() {
                break;
            }

            // CHECK_CONNECTIVITY: blocks until the network answers
            wait_until_connected(id, &self.gate, &self.connectivity).await;
            if self.stopping() {
                break;
            }

            self.print_status_block();
            let iter_start = Instant::now();

            // GENERATE: a failure costs this iteration only
            let candidate = match self.generator.generate(&mut self.rng) {
                Ok(candidate) => candidate,
                Err(e) => {
                    report::status(&format!("Worker {} - {}", id, e), "❌");
                    self.state.last_status = STATUS_GENERATION_FAILED;
                    continue;
                }
            };

            // PROBE: bounded-concurrency balance batch, never fails
            let probe_start = Instant::now();
            let result = self.probe.check(candidate).await;
            let probe_duration = probe_start.elapsed();

            // RECORD
            if result.found {
                if let Err(e) = self.sink.record(&result) {
                    // The balance stays on chain; losing the log line must not kill the worker
                    report::status(&format!("Worker {} - failed to persist finding: {}", id, e), "❌");
                }
            }
            self.state
                .record_iteration(iter_start.elapsed(), probe_duration, result.found);
        }

        self.print_final_summary();
        self.state
    }

    /// Header for iteration k showing iteration k-1 (one-iteration lag)
    fn print_status_block(&self) {
        let stats = self.state.snapshot();
        let id = stats.worker_id;

        report::separator();
        report::status(
            &format!("Worker {} - Total Runtime: {}", id, format_dur(stats.total_runtime)),
            "⏱️",
        );
        report::status(
            &format!(
                "Worker {} - Check {} at {}",
                id,
                report::format_num(stats.iterations + 1),
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            "🔄",
        );
        if stats.iterations > 0 {
            report::status(
                &format!(
                    "Worker {} - Previous Check {} completed in {}",
                    id,
                    report::format_num(stats.iterations),
                    format_dur(stats.last_iter)
                ),
                "✅",
            );
            report::status(
                &format!("Worker {} - Previous API Check Time: {}", id, format_dur(stats.last_probe)),
                "🌐",
            );
            report::status(
                &format!("Worker {} - Previous Check Result: {}", id, stats.last_status),
                "💰",
            );
            report::status(
                &format!(
                    "Worker {} - Total Balances Found So Far: {}",
                    id,
                    report::format_num(stats.findings)
                ),
                "📊",
            );
        }
        report::separator();
    }

    fn print_final_summary(&self) {
        let stats = self.state.snapshot();
        let id = stats.worker_id;
        report::status(&format!("Worker {} stopped.", id), "🛑");
        report::status(
            &format!("Worker {} - Total runtime: {}", id, format_dur(stats.total_runtime)),
            "⏱️",
        );
        report::status(
            &format!(
                "Worker {} - Checks completed: {}",
                id,
                report::format_num(stats.iterations)
            ),
            "🔄",
        );
        report::status(
            &format!(
                "Worker {} - Total balances found during the session: {}",
                id,
                report::format_num(stats.findings)
            ),
            "📊",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use crate::error::Result;
    use crate::probe::ProbeError;
    use crate::types::{CandidateResult, Chain};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64;

    struct AlwaysUp;

    #[async_trait]
    impl Reachability for AlwaysUp {
        async fn probe(&self) -> bool {
            true
        }
    }

    /// Zero-balance backend that trips the shutdown flag after a fixed
    /// number of candidates have been fully probed.
    struct CountingBackend {
        fetches: AtomicU64,
        fetches_per_candidate: u64,
        stop_after_candidates: u64,
        shutdown: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BalanceBackend for CountingBackend {
        async fn fetch(
            &self,
            _chain: Chain,
            _address: &str,
        ) -> std::result::Result<u128, ProbeError> {
            let done = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if done >= self.stop_after_candidates * self.fetches_per_candidate {
                self.shutdown.store(true, Ordering::SeqCst);
            }
            Ok(0)
        }
    }

    struct NullSink {
        count: AtomicU64,
    }

    impl FindingSink for NullSink {
        fn record(&self, _result: &CandidateResult) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn total(&self) -> u64 {
            self.count.load(Ordering::SeqCst)
        }
    }

    fn fast_connectivity() -> ConnectivityConfig {
        ConnectivityConfig {
            hosts: vec!["127.0.0.1:1".to_string()],
            probe_timeout_ms: 10,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    fn fast_probe_config() -> ProbeConfig {
        ProbeConfig {
            max_inflight: 4,
            timeout_ms: 100,
            max_retries: 0,
            retry_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_loop_counts_one_per_completed_iteration() {
        let shutdown = Arc::new(AtomicBool::new(false));
        // One address index → 3 addresses (P2PKH, P2WPKH, ETH) per candidate
        let backend = Arc::new(CountingBackend {
            fetches: AtomicU64::new(0),
            fetches_per_candidate: 3,
            stop_after_candidates: 3,
            shutdown: shutdown.clone(),
        });
        let worker = WorkerLoop::new(
            1,
            MnemonicGenerator::new(12, 1),
            BalanceProbe::new(backend, fast_probe_config()),
            AlwaysUp,
            fast_connectivity(),
            Arc::new(NullSink { count: AtomicU64::new(0) }),
            shutdown.clone(),
        );

        let state = worker.run().await;

        // The flag trips during candidate 3's probe; that iteration still records
        assert_eq!(state.iterations, 3);
        assert_eq!(state.findings, 0);
        assert_eq!(state.last_status, STATUS_NONE);
        assert!(shutdown.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_preset_shutdown_stops_before_first_iteration() {
        let shutdown = Arc::new(AtomicBool::new(true));
        let backend = Arc::new(CountingBackend {
            fetches: AtomicU64::new(0),
            fetches_per_candidate: 3,
            stop_after_candidates: u64::MAX,
            shutdown: shutdown.clone(),
        });
        let worker = WorkerLoop::new(
            2,
            MnemonicGenerator::new(12, 1),
            BalanceProbe::new(backend.clone(), fast_probe_config()),
            AlwaysUp,
            fast_connectivity(),
            Arc::new(NullSink { count: AtomicU64::new(0) }),
            shutdown,
        );

        let state = worker.run().await;
        assert_eq!(state.iterations, 0);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finding_reaches_sink_and_counters() {
        struct RichBackend {
            shutdown: Arc<AtomicBool>,
        }

        #[async_trait]
        impl BalanceBackend for RichBackend {
            async fn fetch(
                &self,
                _chain: Chain,
                _address: &str,
            ) -> std::result::Result<u128, ProbeError> {
                self.shutdown.store(true, Ordering::SeqCst);
                Ok(21_000_000)
            }
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let sink = Arc::new(NullSink { count: AtomicU64::new(0) });
        let worker = WorkerLoop::new(
            3,
            MnemonicGenerator::new(12, 1),
            BalanceProbe::new(Arc::new(RichBackend { shutdown: shutdown.clone() }), fast_probe_config()),
            AlwaysUp,
            fast_connectivity(),
            sink.clone(),
            shutdown,
        );

        let state = worker.run().await;
        assert_eq!(state.iterations, 1);
        assert_eq!(state.findings, 1);
        assert_eq!(state.last_status, STATUS_FOUND);
        assert_eq!(sink.total(), 1);
    }
}
