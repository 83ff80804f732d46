use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use seedscan::config::{Config, ConnectivityConfig, DEFAULT_CONFIG_FILE};
use seedscan::connectivity::{wait_until_connected, TcpReachability};
use seedscan::error::Result;
use seedscan::orchestrator;
use seedscan::report::{self, format_dur, format_num};

fn main() {
    println!("\n\x1b[1;36m╔═══════════════════════════════════════════════════════╗");
    println!("║     SEEDSCAN  •  Mnemonic Balance Scanner              ║");
    println!("║         BTC (P2PKH, P2WPKH)  •  ETH                    ║");
    println!("╚═══════════════════════════════════════════════════════╝\x1b[0m\n");

    if let Err(e) = run() {
        report::status(&format!("{}", e), "❌");
        report::status(
            "Environment setup is incomplete. Please resolve the issues above before starting.",
            "❌",
        );
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Startup gate runs before config exists, so it uses the built-in hosts
    report::status("Checking for internet connection...", "🌐");
    block_on_gate(&ConnectivityConfig::default());

    report::status("Running configuration setup...", "🛠️");
    let config_path = Config::setup(Path::new(DEFAULT_CONFIG_FILE))?;

    report::status("Validating configuration...", "✅");
    let config = Config::load(&config_path)?;

    let worker_count = orchestrator::prompt_worker_count(orchestrator::capacity());

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_sig = shutdown.clone();
    ctrlc::set_handler(move || {
        println!("\n[!] Stopping after in-flight checks complete...");
        shutdown_sig.store(true, Ordering::SeqCst);
    })
    .ok();

    let states = orchestrator::launch(&config, worker_count, shutdown)?;

    let iterations: u64 = states.iter().map(|s| s.iterations).sum();
    let findings: u64 = states.iter().map(|s| s.findings).sum();
    let runtime = states
        .iter()
        .map(|s| s.elapsed())
        .max()
        .unwrap_or_default();
    println!(
        "\n[Done] {} checks across {} worker(s), {} balance(s) found in {}",
        format_num(iterations),
        states.len(),
        format_num(findings),
        format_dur(runtime)
    );
    Ok(())
}

/// The gate is async; main is not. One throwaway current-thread runtime
/// covers the single startup check.
fn block_on_gate(config: &ConnectivityConfig) {
    let gate = TcpReachability::from_config(config);
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => {
            runtime.block_on(wait_until_connected(0, &gate, config));
        }
        Err(e) => {
            // Workers gate again per iteration; a missing startup check is survivable
            report::status(&format!("Startup connectivity check skipped: {}", e), "⚠️");
        }
    }
}
