//! Orchestrator: prompt for a worker count, spawn that many independent
//! worker threads, propagate one shutdown signal, wait for all of them.
//!
//! Workers share nothing but the shutdown flag and the finding sink. The
//! search space is deliberately not partitioned; overlap between workers is
//! accepted.

use std::io::{self, BufRead, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::connectivity::{Reachability, TcpReachability};
use crate::derive::MnemonicGenerator;
use crate::error::Result;
use crate::probe::{BalanceBackend, BalanceProbe, HttpBackend};
use crate::report::{self, FileSink, FindingSink, FOUND_FILE};
use crate::worker::{WorkerLoop, WorkerState};

pub fn capacity() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Blank, non-numeric, zero, negative or out-of-range input all silently
/// fall back to a single worker. Never an error.
pub fn parse_worker_count(input: &str, capacity: usize) -> usize {
    match input.trim().parse::<i64>() {
        Ok(n) if n >= 1 && n <= capacity as i64 => n as usize,
        _ => 1,
    }
}

pub fn prompt_worker_count(capacity: usize) -> usize {
    print!("Enter the number of workers to use (1-{}): ", capacity);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let count = parse_worker_count(&line, capacity);
            if count == 1 && line.trim() != "1" {
                println!("Defaulting to 1 worker.");
            }
            count
        }
        Err(_) => {
            println!("Defaulting to 1 worker.");
            1
        }
    }
}

/// Spawn one OS thread per worker loop and block until every one of them
/// has reached its stopped state. Panicked workers are skipped in the result.
pub fn run_workers<B, G>(workers: Vec<WorkerLoop<B, G>>) -> Vec<WorkerState>
where
    B: BalanceBackend + 'static,
    G: Reachability + Send + 'static,
{
    let mut handles = Vec::with_capacity(workers.len());
    for worker in workers {
        handles.push(thread::spawn(move || {
            // Inner layer: one single-threaded cooperative scheduler per worker
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("[!] Failed to start worker runtime: {}", e);
                    return worker.into_state();
                }
            };
            runtime.block_on(worker.run())
        }));
    }

    handles
        .into_iter()
        .filter_map(|handle| handle.join().ok())
        .collect()
}

/// Build the production worker set and run it to completion.
pub fn launch(
    config: &Config,
    worker_count: usize,
    shutdown: Arc<AtomicBool>,
) -> Result<Vec<WorkerState>> {
    let sink: Arc<dyn FindingSink> = Arc::new(FileSink::new(FOUND_FILE)?);

    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 1..=worker_count {
        let backend = Arc::new(HttpBackend::new(config)?);
        workers.push(WorkerLoop::new(
            worker_id,
            MnemonicGenerator::from_config(config),
            BalanceProbe::new(backend, config.probe.clone()),
            TcpReachability::from_config(&config.connectivity),
            config.connectivity.clone(),
            sink.clone(),
            shutdown.clone(),
        ));
    }

    report::status(&format!("Starting {} worker(s)...", worker_count), "🚀");
    Ok(run_workers(workers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_inputs_default_to_one() {
        for input in ["", "0", "-1", "abc", "  ", "1.5", "5"] {
            assert_eq!(parse_worker_count(input, 4), 1, "input {:?}", input);
        }
    }

    #[test]
    fn test_valid_inputs_pass_through() {
        assert_eq!(parse_worker_count("1", 4), 1);
        assert_eq!(parse_worker_count("3", 4), 3);
        assert_eq!(parse_worker_count(" 4 \n", 4), 4);
    }

    #[test]
    fn test_out_of_range_defaults_to_one() {
        assert_eq!(parse_worker_count("5", 4), 1);
        assert_eq!(parse_worker_count("100", 4), 1);
    }

    #[test]
    fn test_capacity_is_positive() {
        assert!(capacity() >= 1);
    }
}
