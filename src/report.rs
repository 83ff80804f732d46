//! Console reporting and finding persistence.
//!
//! Workers share nothing but the output stream; interleaving across workers
//! is accepted. Findings additionally go to an append-only JSON-lines file
//! that is synced to disk on every record.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;

use crate::error::Result;
use crate::types::{BalanceResult, CandidateResult};

pub const FOUND_FILE: &str = "found.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped status line
pub fn status(message: &str, symbol: &str) {
    println!("[{}] {} {}", Local::now().format(TIMESTAMP_FORMAT), symbol, message);
}

pub fn separator() {
    println!("{}", "-".repeat(64));
}

/// Sink for candidates that came back with a non-zero balance
pub trait FindingSink: Send + Sync {
    fn record(&self, result: &CandidateResult) -> Result<()>;
    fn total(&self) -> u64;
}

#[derive(Serialize)]
struct FindingRecord<'a> {
    timestamp: String,
    mnemonic: &'a str,
    balances: &'a [BalanceResult],
}

/// Appends findings to a file, one JSON object per line, synced on write.
/// A found candidate is the single thing this program must never lose.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
    count: AtomicU64,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(file),
            count: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FindingSink for FileSink {
    fn record(&self, result: &CandidateResult) -> Result<()> {
        print_finding_banner(result);

        let record = FindingRecord {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            mnemonic: &result.candidate.mnemonic,
            balances: &result.balances,
        };
        let line = serde_json::to_string(&record)?;

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn total(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

fn print_finding_banner(result: &CandidateResult) {
    println!("\n\x1b[1;32m");
    println!("╔═══════════════════════════════════════════════════════╗");
    println!("║                 💰 BALANCE FOUND! 💰                   ║");
    println!("╠═══════════════════════════════════════════════════════╣");
    println!("║ Mnemonic: {}", result.candidate.mnemonic);
    for balance in &result.balances {
        println!(
            "║ {} ({}): {} [{}]",
            balance.address,
            balance.chain.as_str(),
            balance.amount,
            balance.status.as_str()
        );
    }
    println!("╚═══════════════════════════════════════════════════════╝");
    println!("\x1b[0m");
}

// ============================================================================
// FORMAT HELPERS
// ============================================================================

pub fn format_num(n: u64) -> String {
    let s = n.to_string();
    let mut r = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            r.push(',');
        }
        r.push(c);
    }
    r.chars().rev().collect()
}

pub fn format_dur(d: Duration) -> String {
    let s = d.as_secs_f64();
    if s < 1.0 {
        format!("{:.0}ms", s * 1000.0)
    } else if s < 60.0 {
        format!("{:.1}s", s)
    } else if s < 3600.0 {
        format!("{:.0}m{:.0}s", (s / 60.0).floor(), s % 60.0)
    } else {
        format!("{:.0}h{:.0}m", (s / 3600.0).floor(), (s % 3600.0) / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, Chain};
    use zeroize::Zeroizing;

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(0), "0");
        assert_eq!(format_num(999), "999");
        assert_eq!(format_num(1000), "1,000");
        assert_eq!(format_num(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_dur() {
        assert_eq!(format_dur(Duration::from_millis(250)), "250ms");
        assert_eq!(format_dur(Duration::from_secs(5)), "5.0s");
        assert_eq!(format_dur(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_dur(Duration::from_secs(7500)), "2h5m");
    }

    #[test]
    fn test_file_sink_appends_json_lines() {
        let path = std::env::temp_dir().join(format!("seedscan-found-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = FileSink::new(&path).unwrap();
        assert_eq!(sink.total(), 0);

        let result = CandidateResult::new(
            Candidate {
                mnemonic: "abandon ability able".to_string(),
                seed: Zeroizing::new(vec![0u8; 64]),
                addresses: Vec::new(),
            },
            vec![BalanceResult::confirmed(
                "1BoatSLRHtKNngkdXEeobR76b53LETtpyT".to_string(),
                Chain::Bitcoin,
                5000,
            )],
        );
        assert!(result.found);

        sink.record(&result).unwrap();
        sink.record(&result).unwrap();
        assert_eq!(sink.total(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["mnemonic"], "abandon ability able");
        assert_eq!(parsed["balances"][0]["amount"], 5000);
        assert_eq!(parsed["balances"][0]["status"], "nonzero");

        std::fs::remove_file(&path).unwrap();
    }
}
