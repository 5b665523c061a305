//! Session-scoped seed lifecycle
//!
//! `FairnessEngine` owns the seed pair and nonce counter of one player session.
//! Every round captures `(seeds, nonce)` in a single critical section, and
//! rotation takes the same lock, so a capture can never straddle a rotation.
//!
//! States: uninitialized (no pair) -> committed (hash published, seed secret)
//! -> rotating (inside `rotate_seed_pair`, under the lock) -> committed.

use crate::config::{RotationPolicy, SeedConfig};
use crate::errors::{FairnessError, FairnessResult};
use crate::games::types::ProvableFairData;
use crate::seeds::{random_string, validate_client_seed, RevealedSeed, SeedCommitment, SeedPair};
use std::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Default)]
struct SessionSeeds {
    pair: Option<SeedPair>,
    /// Client seed chosen before the first commitment
    pending_client_seed: Option<String>,
    revealed: Vec<RevealedSeed>,
}

/// Seed pair, nonce issuance and rotation for one session
pub struct FairnessEngine {
    config: SeedConfig,
    state: Mutex<SessionSeeds>,
}

impl FairnessEngine {
    pub fn new(config: SeedConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SessionSeeds::default()),
        }
    }

    /// Engine that is already committed to a fresh seed pair
    pub fn initialized(config: SeedConfig) -> FairnessResult<Self> {
        let engine = Self::new(config);
        engine.initialize()?;
        Ok(engine)
    }

    /// Generate and commit the first seed pair.
    ///
    /// Already-committed engines keep their pair and return its commitment.
    pub fn initialize(&self) -> FairnessResult<SeedCommitment> {
        let mut state = self.state.lock()?;
        if let Some(pair) = state.pair.as_ref() {
            return Ok(pair.commitment());
        }

        let client_seed = match state.pending_client_seed.take() {
            Some(seed) => seed,
            None => random_string(self.config.client_seed_length)?,
        };
        let pair = SeedPair::generate(self.config.server_seed_length, client_seed)?;
        let commitment = pair.commitment();

        info!(
            server_seed_hash = %pair.server_seed_hash,
            client_seed = %pair.client_seed,
            "Committed new seed pair"
        );
        state.pair = Some(pair);
        Ok(commitment)
    }

    /// Public commitment for the current pair; commits one first if needed
    pub fn commit_seed_pair(&self) -> FairnessResult<SeedCommitment> {
        self.initialize()
    }

    pub fn is_initialized(&self) -> FairnessResult<bool> {
        Ok(self.state.lock()?.pair.is_some())
    }

    pub fn commitment(&self) -> FairnessResult<SeedCommitment> {
        let state = self.state.lock()?;
        state
            .pair
            .as_ref()
            .map(SeedPair::commitment)
            .ok_or(FairnessError::NotInitialized)
    }

    /// Replace the client seed. Rounds already captured keep the old value.
    pub fn set_client_seed(&self, seed: &str) -> FairnessResult<()> {
        validate_client_seed(seed, self.config.max_client_seed_length)?;

        let mut state = self.state.lock()?;
        match state.pair.as_mut() {
            Some(pair) => pair.client_seed = seed.to_string(),
            None => state.pending_client_seed = Some(seed.to_string()),
        }
        debug!(client_seed = seed, "Client seed updated");
        Ok(())
    }

    /// Current client seed, if one has been chosen or generated
    pub fn client_seed(&self) -> FairnessResult<Option<String>> {
        let state = self.state.lock()?;
        Ok(state
            .pair
            .as_ref()
            .map(|p| p.client_seed.clone())
            .or_else(|| state.pending_client_seed.clone()))
    }

    /// Hand out the current nonce and advance the counter
    pub fn draw_nonce(&self) -> FairnessResult<u64> {
        let mut state = self.state.lock()?;
        let pair = state.pair.as_mut().ok_or(FairnessError::NotInitialized)?;
        let nonce = pair.nonce;
        pair.nonce = next_nonce(pair)?;
        Ok(nonce)
    }

    /// Draw a nonce and snapshot the seed pair for one round.
    ///
    /// `client_seed_override` applies to this round only.
    pub fn capture_round(&self, client_seed_override: Option<&str>) -> FairnessResult<ProvableFairData> {
        self.capture_round_with_rotation(client_seed_override, &RotationPolicy::Manual)
            .map(|(fair, _)| fair)
    }

    /// Capture one round and, if that round exhausts the epoch under `policy`,
    /// rotate in the same critical section.
    ///
    /// The successor pair is generated before the nonce moves, so a failed
    /// rotation leaves the session exactly as it was and no round is issued.
    pub fn capture_round_with_rotation(
        &self,
        client_seed_override: Option<&str>,
        policy: &RotationPolicy,
    ) -> FairnessResult<(ProvableFairData, Option<RevealedSeed>)> {
        if let Some(seed) = client_seed_override {
            validate_client_seed(seed, self.config.max_client_seed_length)?;
        }

        let mut state = self.state.lock()?;
        let pair = state.pair.as_mut().ok_or(FairnessError::NotInitialized)?;
        if let Err(e) = pair.check_integrity() {
            error!(error = %e, "Seed pair failed integrity check before round");
            return Err(e);
        }

        let nonce = pair.nonce;
        let advanced = next_nonce(pair)?;
        let successor = if policy.is_due(advanced) {
            Some(SeedPair::generate(
                self.config.server_seed_length,
                pair.client_seed.clone(),
            )?)
        } else {
            None
        };

        let fair = ProvableFairData {
            server_seed: pair.server_seed.clone(),
            server_seed_hash: pair.server_seed_hash.clone(),
            client_seed: client_seed_override
                .map(str::to_string)
                .unwrap_or_else(|| pair.client_seed.clone()),
            nonce,
        };
        pair.nonce = advanced;

        let revealed = match successor {
            Some(next) => Some(Self::reveal_locked(&mut state, next)?),
            None => None,
        };
        Ok((fair, revealed))
    }

    /// Close the current epoch: reveal its server seed and commit a new one.
    ///
    /// The client seed carries over; the nonce restarts at 0.
    pub fn rotate_seed_pair(&self) -> FairnessResult<RevealedSeed> {
        let mut state = self.state.lock()?;
        let current = state.pair.as_ref().ok_or(FairnessError::NotInitialized)?;
        if let Err(e) = current.check_integrity() {
            error!(
                server_seed_hash = %current.server_seed_hash,
                error = %e,
                "Refusing to rotate: revealed seed does not match its commitment"
            );
            return Err(e);
        }

        let next = SeedPair::generate(self.config.server_seed_length, current.client_seed.clone())?;
        Self::reveal_locked(&mut state, next)
    }

    /// Swap in `next` and log the outgoing seed; the caller has checked integrity
    fn reveal_locked(state: &mut SessionSeeds, next: SeedPair) -> FairnessResult<RevealedSeed> {
        let previous = std::mem::replace(current_mut(state)?, next);

        let revealed = RevealedSeed {
            revealed_server_seed: previous.server_seed,
            previous_hash: previous.server_seed_hash,
            rounds_played: previous.nonce,
            revealed_at: chrono::Utc::now().timestamp_millis(),
        };

        info!(
            previous_hash = %revealed.previous_hash,
            rounds_played = revealed.rounds_played,
            next_hash = %state.pair.as_ref().map(|p| p.server_seed_hash.as_str()).unwrap_or_default(),
            "Rotated server seed"
        );
        state.revealed.push(revealed.clone());
        Ok(revealed)
    }

    /// Seeds revealed by earlier rotations, oldest first
    pub fn revealed_epochs(&self) -> FairnessResult<Vec<RevealedSeed>> {
        Ok(self.state.lock()?.revealed.clone())
    }

    /// Reveal record for the epoch committed under `server_seed_hash`
    pub fn revealed_for(&self, server_seed_hash: &str) -> FairnessResult<Option<RevealedSeed>> {
        let state = self.state.lock()?;
        Ok(state
            .revealed
            .iter()
            .find(|r| r.previous_hash == server_seed_hash)
            .cloned())
    }

    /// Adopt a persisted seed pair after re-checking its commitment
    pub fn restore(&self, pair: SeedPair) -> FairnessResult<()> {
        if let Err(e) = pair.check_integrity() {
            error!(
                server_seed_hash = %pair.server_seed_hash,
                error = %e,
                "Persisted seed pair does not match its commitment"
            );
            return Err(e);
        }
        validate_client_seed(&pair.client_seed, self.config.max_client_seed_length)?;

        let mut state = self.state.lock()?;
        info!(
            server_seed_hash = %pair.server_seed_hash,
            nonce = pair.nonce,
            "Restored seed pair"
        );
        state.pending_client_seed = None;
        state.pair = Some(pair);
        Ok(())
    }

    /// Adopt a persisted client seed, before or after the first commitment
    pub fn restore_client_seed(&self, seed: &str) -> FairnessResult<()> {
        self.set_client_seed(seed)?;
        info!(client_seed = seed, "Restored client seed");
        Ok(())
    }

    /// Hand the full pair, secret server seed included, to `sink` while the
    /// session lock is held.
    ///
    /// Snapshots reach the sink in nonce order, so a sink that queues them
    /// (the persistence channel) never stores an older pair after a newer one.
    pub(crate) fn with_seed_pair<F>(&self, sink: F) -> FairnessResult<()>
    where
        F: FnOnce(&SeedPair),
    {
        let state = self.state.lock()?;
        let pair = state.pair.as_ref().ok_or(FairnessError::NotInitialized)?;
        sink(pair);
        Ok(())
    }
}

fn current_mut(state: &mut SessionSeeds) -> FairnessResult<&mut SeedPair> {
    state.pair.as_mut().ok_or(FairnessError::NotInitialized)
}

fn next_nonce(pair: &SeedPair) -> FairnessResult<u64> {
    pair.nonce
        .checked_add(1)
        .ok_or_else(|| FairnessError::NonceExhausted(pair.server_seed_hash.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::hash_server_seed;

    fn engine() -> FairnessEngine {
        FairnessEngine::initialized(SeedConfig::default()).unwrap()
    }

    #[test]
    fn test_initialize_commits_pair() {
        let engine = FairnessEngine::new(SeedConfig::default());
        assert!(!engine.is_initialized().unwrap());
        assert!(matches!(engine.draw_nonce(), Err(FairnessError::NotInitialized)));

        let commitment = engine.initialize().unwrap();
        assert_eq!(commitment.server_seed_hash.len(), 64);
        assert_eq!(commitment.client_seed.len(), 16);
        assert_eq!(commitment.next_nonce, 0);

        engine
            .with_seed_pair(|pair| {
                assert_eq!(pair.server_seed.len(), 32);
                assert_eq!(hash_server_seed(&pair.server_seed), pair.server_seed_hash);
            })
            .unwrap();
    }

    #[test]
    fn test_commit_is_idempotent() {
        let engine = FairnessEngine::new(SeedConfig::default());
        let first = engine.commit_seed_pair().unwrap();
        engine.draw_nonce().unwrap();
        let second = engine.commit_seed_pair().unwrap();
        assert_eq!(first.server_seed_hash, second.server_seed_hash);
        assert_eq!(second.next_nonce, 1);
    }

    #[test]
    fn test_nonce_sequence() {
        let engine = engine();
        let nonces: Vec<u64> = (0..10).map(|_| engine.draw_nonce().unwrap()).collect();
        assert_eq!(nonces, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_client_seed_before_initialize_is_used() {
        let engine = FairnessEngine::new(SeedConfig::default());
        engine.set_client_seed("my-lucky-seed").unwrap();
        let commitment = engine.initialize().unwrap();
        assert_eq!(commitment.client_seed, "my-lucky-seed");
    }

    #[test]
    fn test_set_client_seed_keeps_nonce_and_server_seed() {
        let engine = engine();
        engine.draw_nonce().unwrap();
        let before = engine.commitment().unwrap();

        engine.set_client_seed("new-seed").unwrap();
        let after = engine.commitment().unwrap();
        assert_eq!(after.client_seed, "new-seed");
        assert_eq!(after.server_seed_hash, before.server_seed_hash);
        assert_eq!(after.next_nonce, 1);

        assert!(matches!(engine.set_client_seed(""), Err(FairnessError::InvalidSeed(_))));
    }

    #[test]
    fn test_captured_round_keeps_old_client_seed() {
        let engine = engine();
        engine.set_client_seed("first").unwrap();
        let captured = engine.capture_round(None).unwrap();
        engine.set_client_seed("second").unwrap();

        assert_eq!(captured.client_seed, "first");
        assert_eq!(engine.capture_round(None).unwrap().client_seed, "second");
    }

    #[test]
    fn test_client_seed_override_is_per_round() {
        let engine = engine();
        engine.set_client_seed("session").unwrap();
        assert_eq!(engine.capture_round(Some("once")).unwrap().client_seed, "once");
        assert_eq!(engine.capture_round(None).unwrap().client_seed, "session");
        assert!(engine.capture_round(Some("")).is_err());
    }

    #[test]
    fn test_rotation_reveals_previous_seed() {
        let engine = engine();
        let committed = engine.commitment().unwrap();
        for _ in 0..5 {
            engine.capture_round(None).unwrap();
        }

        let revealed = engine.rotate_seed_pair().unwrap();
        assert_eq!(revealed.previous_hash, committed.server_seed_hash);
        assert_eq!(hash_server_seed(&revealed.revealed_server_seed), revealed.previous_hash);
        assert_eq!(revealed.rounds_played, 5);

        let next = engine.commitment().unwrap();
        assert_eq!(next.next_nonce, 0);
        assert_ne!(next.server_seed_hash, committed.server_seed_hash);
        assert_eq!(next.client_seed, committed.client_seed);

        assert_eq!(engine.revealed_epochs().unwrap(), vec![revealed.clone()]);
        assert_eq!(engine.revealed_for(&committed.server_seed_hash).unwrap(), Some(revealed));
    }

    #[test]
    fn test_capture_rotates_when_epoch_is_exhausted() {
        let engine = engine();
        let committed = engine.commitment().unwrap();
        let policy = RotationPolicy::EveryNRounds { rounds: 3 };

        for expected in 0..2 {
            let (fair, rotated) = engine.capture_round_with_rotation(None, &policy).unwrap();
            assert_eq!(fair.nonce, expected);
            assert!(rotated.is_none());
        }

        let (last, rotated) = engine.capture_round_with_rotation(None, &policy).unwrap();
        let revealed = rotated.expect("third round closes the epoch");
        assert_eq!(last.nonce, 2);
        assert_eq!(last.server_seed, revealed.revealed_server_seed);
        assert_eq!(revealed.previous_hash, committed.server_seed_hash);
        assert_eq!(revealed.rounds_played, 3);
        assert_eq!(engine.commitment().unwrap().next_nonce, 0);

        let (_, rotated) = engine
            .capture_round_with_rotation(None, &RotationPolicy::Manual)
            .unwrap();
        assert!(rotated.is_none());
    }

    #[test]
    fn test_failed_capture_issues_nothing() {
        let engine = engine();
        let policy = RotationPolicy::EveryNRounds { rounds: 1 };
        engine
            .state
            .lock()
            .unwrap()
            .pair
            .as_mut()
            .unwrap()
            .server_seed
            .push('x');

        let err = engine.capture_round_with_rotation(None, &policy).unwrap_err();
        assert!(err.is_integrity_failure());
        assert_eq!(engine.commitment().unwrap().next_nonce, 0);
        assert!(engine.revealed_epochs().unwrap().is_empty());
    }

    #[test]
    fn test_exhausted_nonce_is_an_error() {
        let engine = FairnessEngine::new(SeedConfig::default());
        let mut pair = SeedPair::generate(32, "client".to_string()).unwrap();
        pair.nonce = u64::MAX;
        engine.restore(pair).unwrap();

        assert!(matches!(engine.draw_nonce(), Err(FairnessError::NonceExhausted(_))));
        assert!(matches!(engine.capture_round(None), Err(FairnessError::NonceExhausted(_))));
        assert_eq!(engine.commitment().unwrap().next_nonce, u64::MAX);

        // rotation is still possible and starts a fresh epoch
        let revealed = engine.rotate_seed_pair().unwrap();
        assert_eq!(revealed.rounds_played, u64::MAX);
        assert_eq!(engine.draw_nonce().unwrap(), 0);
    }

    #[test]
    fn test_restore_rejects_broken_commitment() {
        let engine = FairnessEngine::new(SeedConfig::default());
        let mut pair = SeedPair::generate(32, "client".to_string()).unwrap();
        pair.server_seed_hash = hash_server_seed("something else");

        let err = engine.restore(pair).unwrap_err();
        assert!(err.is_integrity_failure());
        assert!(!engine.is_initialized().unwrap());
    }

    #[test]
    fn test_restore_client_seed_feeds_first_commitment() {
        let engine = FairnessEngine::new(SeedConfig::default());
        engine.restore_client_seed("from-disk").unwrap();
        assert_eq!(engine.initialize().unwrap().client_seed, "from-disk");
        assert!(engine.restore_client_seed("").is_err());
    }

    #[test]
    fn test_restore_keeps_nonce() {
        let engine = FairnessEngine::new(SeedConfig::default());
        let mut pair = SeedPair::generate(32, "client".to_string()).unwrap();
        pair.nonce = 42;
        engine.restore(pair).unwrap();
        assert_eq!(engine.draw_nonce().unwrap(), 42);
    }
}
