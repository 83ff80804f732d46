//! Candidate generation: entropy → BIP39 mnemonic → seed → address set.
//!
//! The rng is supplied by the caller so the whole chain is deterministic
//! under test. Production workers pass a CSPRNG; anything else would make
//! the scan pointless.

use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, CompressedPublicKey, Network, NetworkKind, PrivateKey, PublicKey};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{CryptoRng, RngCore};
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{Result, ScanError};
use crate::types::{Candidate, Chain, DerivedAddress};

pub struct MnemonicGenerator {
    word_count: usize,
    addresses_per_chain: u32,
}

impl MnemonicGenerator {
    pub fn new(word_count: usize, addresses_per_chain: u32) -> Self {
        Self { word_count, addresses_per_chain }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.word_count, config.addresses_per_chain)
    }

    /// One candidate per call: fresh entropy, mnemonic, seed and the derived
    /// address set for every account index. Any failure aborts only the
    /// current iteration; the worker moves on to the next candidate.
    pub fn generate<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Candidate> {
        // 12 words = 128 bits of entropy, +32 bits per 3 extra words
        let entropy_len = self.word_count / 3 * 4;
        let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
        rng.try_fill_bytes(entropy.as_mut_slice())
            .map_err(|e| ScanError::Derivation(format!("entropy source failed: {}", e)))?;

        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| ScanError::Derivation(format!("mnemonic encoding failed: {}", e)))?;
        let seed = Zeroizing::new(mnemonic.to_seed("").to_vec());

        let mut addresses =
            Vec::with_capacity(self.addresses_per_chain as usize * (Chain::ALL.len() + 1));
        for index in 0..self.addresses_per_chain {
            let (p2pkh, p2wpkh) = derive_bitcoin_addresses(&seed, index)?;
            addresses.push(DerivedAddress {
                chain: Chain::Bitcoin,
                derivation_path: format!("m/44'/0'/0'/0/{}", index),
                address: p2pkh,
            });
            addresses.push(DerivedAddress {
                chain: Chain::Bitcoin,
                derivation_path: format!("m/84'/0'/0'/0/{}", index),
                address: p2wpkh,
            });
            addresses.push(DerivedAddress {
                chain: Chain::Ethereum,
                derivation_path: format!("m/44'/60'/0'/0/{}", index),
                address: derive_ethereum_address(&seed, index)?,
            });
        }

        Ok(Candidate {
            mnemonic: mnemonic.to_string(),
            seed,
            addresses,
        })
    }
}

/// Legacy P2PKH at m/44'/0'/0'/0/i and native segwit P2WPKH at m/84'/0'/0'/0/i
fn derive_bitcoin_addresses(seed: &[u8], index: u32) -> Result<(String, String)> {
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(Network::Bitcoin, seed)
        .map_err(|e| ScanError::Derivation(format!("bitcoin master key: {}", e)))?;

    let legacy = derive_bitcoin_key(&secp, &master, 44, index)?;
    let public_key = PublicKey::from_private_key(&secp, &legacy);
    let p2pkh = Address::p2pkh(public_key, Network::Bitcoin).to_string();

    let segwit = derive_bitcoin_key(&secp, &master, 84, index)?;
    let compressed = CompressedPublicKey::from_private_key(&secp, &segwit)
        .map_err(|e| ScanError::Derivation(format!("compressed public key: {:?}", e)))?;
    let p2wpkh = Address::p2wpkh(&compressed, Network::Bitcoin).to_string();

    Ok((p2pkh, p2wpkh))
}

fn derive_bitcoin_key(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    master: &Xpriv,
    purpose: u32,
    index: u32,
) -> Result<PrivateKey> {
    let path = DerivationPath::from(vec![
        child_hardened(purpose)?,
        child_hardened(0)?,
        child_hardened(0)?,
        child_normal(0)?,
        child_normal(index)?,
    ]);
    let derived = master
        .derive_priv(secp, &path)
        .map_err(|e| ScanError::Derivation(format!("bitcoin derivation m/{}': {}", purpose, e)))?;
    Ok(PrivateKey::new(derived.private_key, NetworkKind::Main))
}

fn child_hardened(index: u32) -> Result<ChildNumber> {
    ChildNumber::from_hardened_idx(index)
        .map_err(|e| ScanError::Derivation(format!("invalid hardened index {}: {}", index, e)))
}

fn child_normal(index: u32) -> Result<ChildNumber> {
    ChildNumber::from_normal_idx(index)
        .map_err(|e| ScanError::Derivation(format!("invalid child index {}: {}", index, e)))
}

/// Keccak256 of the uncompressed public key, last 20 bytes, hex with 0x prefix
fn derive_ethereum_address(seed: &[u8], index: u32) -> Result<String> {
    use bip32::XPrv;

    let path = format!("m/44'/60'/0'/0/{}", index);
    let parsed = path
        .parse()
        .map_err(|e| ScanError::Derivation(format!("ethereum path {}: {}", path, e)))?;
    let xprv = XPrv::derive_from_path(seed, &parsed)
        .map_err(|e| ScanError::Derivation(format!("ethereum derivation: {}", e)))?;

    let secret_bytes = Zeroizing::new(xprv.to_bytes());
    let signing_key = SigningKey::from_bytes(&(*secret_bytes).into())
        .map_err(|e| ScanError::Derivation(format!("ethereum signing key: {}", e)))?;
    let public = signing_key.verifying_key().to_encoded_point(false);

    let mut hasher = Keccak::v256();
    hasher.update(&public.as_bytes()[1..]);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    Ok(format!("0x{}", hex::encode(&hash[12..])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_known_entropy_vector() {
        // All-zero 128-bit entropy is the canonical BIP39 test vector
        let gen = MnemonicGenerator::new(12, 1);
        let mut rng = ZeroRng;
        let candidate = gen.generate(&mut rng).unwrap();
        assert_eq!(
            candidate.mnemonic,
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
        );
        assert_eq!(candidate.seed.len(), 64);
    }

    #[test]
    fn test_address_set_shape() {
        let gen = MnemonicGenerator::new(12, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let candidate = gen.generate(&mut rng).unwrap();

        // Per index: P2PKH, P2WPKH, Ethereum
        assert_eq!(candidate.addresses.len(), 6);
        assert!(candidate.addresses[0].address.starts_with('1'));
        assert!(candidate.addresses[1].address.starts_with("bc1q"));
        let eth = &candidate.addresses[2].address;
        assert!(eth.starts_with("0x") && eth.len() == 42);
        assert_eq!(candidate.addresses[3].derivation_path, "m/44'/0'/0'/0/1");
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let gen = MnemonicGenerator::new(24, 1);

        let mut rng = StdRng::seed_from_u64(42);
        let a = gen.generate(&mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let b = gen.generate(&mut rng).unwrap();

        assert_eq!(a.mnemonic, b.mnemonic);
        assert_eq!(a.addresses, b.addresses);
    }

    #[test]
    fn test_different_entropy_different_candidate() {
        let gen = MnemonicGenerator::new(12, 1);
        let mut rng = StdRng::seed_from_u64(1);
        let a = gen.generate(&mut rng).unwrap();
        let b = gen.generate(&mut rng).unwrap();
        assert_ne!(a.mnemonic, b.mnemonic);
    }

    /// Rng that always yields zero bytes; only for the known-vector test
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}
}
