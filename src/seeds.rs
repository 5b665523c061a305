//! Seed generation and commitment primitives
//!
//! A server seed is committed by publishing its SHA-256 digest before any round
//! uses it. The cleartext seed only leaves the engine through rotation.

use crate::errors::{FairnessError, FairnessResult};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Alphabet for generated seeds
pub const SEED_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric string from the OS CSPRNG.
///
/// Fails with `RandomnessUnavailable` when the OS source cannot be read; there is
/// no weaker fallback.
pub fn random_string(length: usize) -> FairnessResult<String> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| FairnessError::RandomnessUnavailable(e.to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| SEED_ALPHABET[*b as usize % SEED_ALPHABET.len()] as char)
        .collect())
}

/// Hex-encoded SHA-256 commitment of a server seed
pub fn hash_server_seed(server_seed: &str) -> String {
    hex::encode(Sha256::digest(server_seed.as_bytes()))
}

/// Check a revealed seed against its published commitment
pub fn verify_commitment(server_seed: &str, published_hash: &str) -> FairnessResult<()> {
    let actual = hash_server_seed(server_seed);
    if actual.eq_ignore_ascii_case(published_hash) {
        Ok(())
    } else {
        Err(FairnessError::IntegrityMismatch {
            expected: published_hash.to_string(),
            actual,
        })
    }
}

/// Validate a player-supplied client seed
pub fn validate_client_seed(seed: &str, max_length: usize) -> FairnessResult<()> {
    if seed.trim().is_empty() {
        return Err(FairnessError::InvalidSeed("client seed must not be empty".to_string()));
    }
    if seed.chars().count() > max_length {
        return Err(FairnessError::InvalidSeed(format!(
            "client seed longer than {} characters",
            max_length
        )));
    }
    if seed.chars().any(char::is_control) {
        return Err(FairnessError::InvalidSeed(
            "client seed contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// The unit of trust for one epoch of play
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedPair {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

impl SeedPair {
    /// Fresh pair with a newly generated server seed and nonce 0
    pub fn generate(server_seed_length: usize, client_seed: String) -> FairnessResult<Self> {
        let server_seed = random_string(server_seed_length)?;
        let server_seed_hash = hash_server_seed(&server_seed);
        Ok(Self {
            server_seed,
            server_seed_hash,
            client_seed,
            nonce: 0,
        })
    }

    /// Confirm the stored hash still commits to the stored seed
    pub fn check_integrity(&self) -> FairnessResult<()> {
        verify_commitment(&self.server_seed, &self.server_seed_hash)
    }

    pub fn commitment(&self) -> SeedCommitment {
        SeedCommitment {
            server_seed_hash: self.server_seed_hash.clone(),
            client_seed: self.client_seed.clone(),
            next_nonce: self.nonce,
        }
    }
}

// The server seed is secret until rotation; keep it out of logs.
impl fmt::Debug for SeedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedPair")
            .field("server_seed", &"<redacted>")
            .field("server_seed_hash", &self.server_seed_hash)
            .field("client_seed", &self.client_seed)
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Public view of the current seed pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedCommitment {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub next_nonce: u64,
}

/// A server seed exposed by rotation, together with the commitment it closes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevealedSeed {
    pub revealed_server_seed: String,
    pub previous_hash: String,
    /// Number of nonces consumed under this seed
    pub rounds_played: u64,
    /// Milliseconds since the Unix epoch
    pub revealed_at: i64,
}

impl RevealedSeed {
    pub fn verify(&self) -> FairnessResult<()> {
        verify_commitment(&self.revealed_server_seed, &self.previous_hash)
    }
}
