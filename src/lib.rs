//! seedscan: continuous mnemonic generation and balance scanning pipeline.
//!
//! Two concurrency layers, kept separate on purpose:
//! - outer: N independent worker threads, sharing only the shutdown flag
//!   and the finding sink
//! - inner: per worker, a single-threaded tokio runtime driving the
//!   connectivity gate and the bounded-concurrency balance probes
//!
//! The trait seams (`Reachability`, `BalanceBackend`, `FindingSink`) exist
//! so every external service can be swapped for a scripted double in tests.

pub mod config;
pub mod connectivity;
pub mod derive;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod types;
pub mod worker;
