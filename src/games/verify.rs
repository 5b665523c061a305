//! Public verification
//!
//! Verification re-runs the derivation; there is no second algorithm to drift
//! out of sync with the one that produced the round.

use crate::errors::{FairnessError, FairnessResult};
use crate::games::derivation::derive_outcome;
use crate::games::types::{GameOutcome, GameType, RoundRecord};
use crate::seeds::{verify_commitment, RevealedSeed};

/// Recompute the outcome for a revealed tuple and compare it to the claim.
///
/// A claim whose shape does not fit `game_type` is an error, not `false`.
pub fn verify(
    game_type: GameType,
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    claimed: &GameOutcome,
) -> FairnessResult<bool> {
    if claimed.game_type() != game_type {
        let expected = match game_type {
            GameType::CoinFlip => "coin side",
            GameType::DiceRoll => "single roll",
            GameType::Slots => "three reels",
        };
        return Err(FairnessError::OutcomeShapeMismatch {
            game: game_type.to_string(),
            expected,
            actual: claimed.shape(),
        });
    }

    let actual = derive_outcome(game_type, server_seed, client_seed, nonce)?;
    Ok(actual == *claimed)
}

/// Verify a recorded round against the seed revealed when its epoch closed.
///
/// The revealed seed must match the hash recorded with the round and the seed
/// the record itself carries; otherwise the commitment is broken.
pub fn verify_round(record: &RoundRecord, revealed: &RevealedSeed) -> FairnessResult<bool> {
    verify_commitment(&revealed.revealed_server_seed, &record.fair.server_seed_hash)?;
    if revealed.previous_hash != record.fair.server_seed_hash {
        return Err(FairnessError::IntegrityMismatch {
            expected: record.fair.server_seed_hash.clone(),
            actual: revealed.previous_hash.clone(),
        });
    }
    if record.fair.server_seed != revealed.revealed_server_seed {
        return Err(FairnessError::IntegrityMismatch {
            expected: record.fair.server_seed_hash.clone(),
            actual: crate::seeds::hash_server_seed(&record.fair.server_seed),
        });
    }

    verify(
        record.game_type,
        &revealed.revealed_server_seed,
        &record.fair.client_seed,
        record.fair.nonce,
        &record.outcome,
    )
}
