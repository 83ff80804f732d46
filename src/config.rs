//! JSON configuration: written with defaults on first run, validated before
//! any worker is spawned. A validation failure is fatal for the whole process.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::types::Chain;

pub const DEFAULT_CONFIG_FILE: &str = "seedscan.json";

const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// How a balance endpoint encodes its answer
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Body is a bare decimal integer (blockchain.info `/q` style)
    Plain,
    /// Body is JSON with a decimal string under `"result"` (blockscout style)
    JsonResult,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Endpoint {
    pub chain: Chain,
    /// URL with an `{address}` placeholder
    pub url_template: String,
    pub response: ResponseFormat,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// In-flight cap per worker. External APIs rate-limit aggressively,
    /// so this stays single-digit by default.
    pub max_inflight: usize,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt; exhaustion degrades to UNCERTAIN
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles on each retry)
    pub retry_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_inflight: 8,
            timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// host:port pairs tried in order; one successful TCP connect is enough
    pub hosts: Vec<String>,
    pub probe_timeout_ms: u64,
    /// First backoff delay in milliseconds (doubles on each failed attempt)
    pub base_delay_ms: u64,
    /// Backoff ceiling; the gate retries forever but never waits longer than this
    pub max_delay_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["1.1.1.1:443".to_string(), "8.8.8.8:443".to_string()],
            probe_timeout_ms: 3_000,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// BIP39 mnemonic length: 12, 15, 18, 21 or 24 words
    pub word_count: usize,
    /// Account indices derived per chain each iteration
    pub addresses_per_chain: u32,
    pub endpoints: Vec<Endpoint>,
    pub probe: ProbeConfig,
    pub connectivity: ConnectivityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            word_count: 12,
            addresses_per_chain: 1,
            endpoints: vec![
                Endpoint {
                    chain: Chain::Bitcoin,
                    url_template: "https://blockchain.info/q/addressbalance/{address}"
                        .to_string(),
                    response: ResponseFormat::Plain,
                },
                Endpoint {
                    chain: Chain::Ethereum,
                    url_template:
                        "https://eth.blockscout.com/api?module=account&action=balance&address={address}"
                            .to_string(),
                    response: ResponseFormat::JsonResult,
                },
            ],
            probe: ProbeConfig::default(),
            connectivity: ConnectivityConfig::default(),
        }
    }
}

impl Config {
    /// Write the default config if the file does not exist yet.
    /// Idempotent; returns the path either way.
    pub fn setup(path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            let contents = serde_json::to_string_pretty(&Config::default())?;
            fs::write(path, contents)?;
        }
        Ok(path.to_path_buf())
    }

    pub fn load(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| ScanError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !VALID_WORD_COUNTS.contains(&self.word_count) {
            return Err(ScanError::Config(format!(
                "word_count must be one of {:?}, got {}",
                VALID_WORD_COUNTS, self.word_count
            )));
        }
        if self.addresses_per_chain < 1 {
            return Err(ScanError::Config(
                "addresses_per_chain must be at least 1".to_string(),
            ));
        }
        for chain in Chain::ALL {
            if !self.endpoints.iter().any(|e| e.chain == chain) {
                return Err(ScanError::Config(format!(
                    "no balance endpoint configured for chain '{}'",
                    chain.as_str()
                )));
            }
        }
        for endpoint in &self.endpoints {
            if !endpoint.url_template.contains("{address}") {
                return Err(ScanError::Config(format!(
                    "endpoint for '{}' is missing the {{address}} placeholder",
                    endpoint.chain.as_str()
                )));
            }
        }
        if self.probe.max_inflight < 1 {
            return Err(ScanError::Config(
                "probe.max_inflight must be at least 1".to_string(),
            ));
        }
        if self.probe.timeout_ms == 0 {
            return Err(ScanError::Config(
                "probe.timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.connectivity.hosts.is_empty() {
            return Err(ScanError::Config(
                "connectivity.hosts must not be empty".to_string(),
            ));
        }
        if self.connectivity.base_delay_ms == 0
            || self.connectivity.max_delay_ms < self.connectivity.base_delay_ms
        {
            return Err(ScanError::Config(
                "connectivity delays must satisfy 0 < base_delay_ms <= max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint_for(&self, chain: Chain) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.chain == chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_word_count_rejected() {
        let mut cfg = Config::default();
        cfg.word_count = 13;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let mut cfg = Config::default();
        cfg.endpoints.retain(|e| e.chain != Chain::Ethereum);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut cfg = Config::default();
        cfg.endpoints[0].url_template = "https://example.com/balance".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_inflight_rejected() {
        let mut cfg = Config::default();
        cfg.probe.max_inflight = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_backoff_bounds_rejected() {
        let mut cfg = Config::default();
        cfg.connectivity.max_delay_ms = cfg.connectivity.base_delay_ms - 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.word_count, cfg.word_count);
        assert_eq!(back.endpoints.len(), cfg.endpoints.len());
    }

    #[test]
    fn test_setup_writes_default_once() {
        let path = std::env::temp_dir().join(format!("seedscan-test-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);

        let written = Config::setup(&path).unwrap();
        assert!(written.exists());
        let loaded = Config::load(&written).unwrap();
        assert_eq!(loaded.word_count, Config::default().word_count);

        // Second call must not touch the existing file
        fs::write(&path, serde_json::to_string(&loaded).unwrap()).unwrap();
        Config::setup(&path).unwrap();
        Config::load(&path).unwrap();

        fs::remove_file(&path).unwrap();
    }
}
