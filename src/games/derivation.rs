//! Deterministic outcome derivation
//!
//! Every sub-draw hashes `server-client-nonce-salt` with SHA-256 and reads the
//! first four digest bytes as a big-endian `u32`. The salt keeps games and reel
//! positions from sharing draws.

use crate::errors::{FairnessError, FairnessResult};
use crate::games::types::{CoinChoice, GameOutcome, GameType};
use sha2::{Digest, Sha256};

pub const COINFLIP_SALT: &str = "coinflip";
pub const DICEROLL_SALT: &str = "diceroll";
pub const SLOTS_SALT_PREFIX: &str = "slots";

pub const DICE_FACES: u32 = 100;
pub const SLOT_REELS: usize = 3;
pub const SLOT_SYMBOLS: u32 = 7;
/// Index of the highest-paying slot symbol
pub const TOP_SYMBOL: u8 = (SLOT_SYMBOLS - 1) as u8;

fn ensure_seeds(server_seed: &str, client_seed: &str) -> FairnessResult<()> {
    if server_seed.is_empty() {
        return Err(FairnessError::InvalidSeed("server seed must not be empty".to_string()));
    }
    if client_seed.is_empty() {
        return Err(FairnessError::InvalidSeed("client seed must not be empty".to_string()));
    }
    Ok(())
}

/// One 32-bit draw for the given salt
pub fn derive_u32(server_seed: &str, client_seed: &str, nonce: u64, salt: &str) -> FairnessResult<u32> {
    ensure_seeds(server_seed, client_seed)?;

    let message = format!("{}-{}-{}-{}", server_seed, client_seed, nonce, salt);
    let digest = Sha256::digest(message.as_bytes());
    Ok(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

pub fn coin_flip(server_seed: &str, client_seed: &str, nonce: u64) -> FairnessResult<CoinChoice> {
    let draw = derive_u32(server_seed, client_seed, nonce, COINFLIP_SALT)?;
    Ok(if draw % 2 == 0 {
        CoinChoice::Heads
    } else {
        CoinChoice::Tails
    })
}

/// Roll in [1, 100]
pub fn dice_roll(server_seed: &str, client_seed: &str, nonce: u64) -> FairnessResult<u8> {
    let draw = derive_u32(server_seed, client_seed, nonce, DICEROLL_SALT)?;
    Ok((draw % DICE_FACES + 1) as u8)
}

/// Three reels, each in [0, 6]
pub fn slots(server_seed: &str, client_seed: &str, nonce: u64) -> FairnessResult<[u8; SLOT_REELS]> {
    let mut reels = [0u8; SLOT_REELS];
    for (index, reel) in reels.iter_mut().enumerate() {
        let salt = format!("{}-{}", SLOTS_SALT_PREFIX, index);
        *reel = (derive_u32(server_seed, client_seed, nonce, &salt)? % SLOT_SYMBOLS) as u8;
    }
    Ok(reels)
}

/// Derive the outcome of one round
pub fn derive_outcome(
    game_type: GameType,
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
) -> FairnessResult<GameOutcome> {
    match game_type {
        GameType::CoinFlip => coin_flip(server_seed, client_seed, nonce).map(GameOutcome::CoinFlip),
        GameType::DiceRoll => dice_roll(server_seed, client_seed, nonce).map(GameOutcome::DiceRoll),
        GameType::Slots => slots(server_seed, client_seed, nonce).map(GameOutcome::Slots),
    }
}
