use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Supported chains for derivation and balance lookup
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Ethereum,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::Bitcoin, Chain::Ethereum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
        }
    }
}

/// One address derived from a candidate seed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedAddress {
    pub chain: Chain,
    pub derivation_path: String,
    pub address: String,
}

/// One generated mnemonic and everything derived from it.
/// Created once per iteration, dropped after RECORD unless a balance was found.
pub struct Candidate {
    pub mnemonic: String,
    pub seed: Zeroizing<Vec<u8>>,
    pub addresses: Vec<DerivedAddress>,
}

/// Outcome of a single balance query.
///
/// `Uncertain` means the probe exhausted its retries without an answer.
/// It is NOT the same as a confirmed zero: a re-scan may still find funds there.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Zero,
    NonZero,
    Uncertain,
}

impl BalanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::NonZero => "non-zero",
            Self::Uncertain => "uncertain",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceResult {
    pub address: String,
    pub chain: Chain,
    pub amount: u128,
    pub status: BalanceStatus,
}

impl BalanceResult {
    /// A query that came back with a definite amount
    pub fn confirmed(address: String, chain: Chain, amount: u128) -> Self {
        let status = if amount > 0 {
            BalanceStatus::NonZero
        } else {
            BalanceStatus::Zero
        };
        Self { address, chain, amount, status }
    }

    /// A query that exhausted its retries without an answer
    pub fn uncertain(address: String, chain: Chain) -> Self {
        Self {
            address,
            chain,
            amount: 0,
            status: BalanceStatus::Uncertain,
        }
    }
}

/// A candidate together with the balance results for all of its addresses.
/// `found` holds iff at least one result is a confirmed non-zero balance.
pub struct CandidateResult {
    pub candidate: Candidate,
    pub balances: Vec<BalanceResult>,
    pub found: bool,
}

impl CandidateResult {
    pub fn new(candidate: Candidate, balances: Vec<BalanceResult>) -> Self {
        let found = balances
            .iter()
            .any(|b| b.status == BalanceStatus::NonZero && b.amount > 0);
        Self { candidate, balances, found }
    }
}
