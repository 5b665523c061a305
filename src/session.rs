//! Game session controller
//!
//! Collects a bet and a prediction, asks the engine for the round's seeds,
//! derives and settles the outcome, and keeps a bounded history plus running
//! statistics per game type. The controller never touches seed state directly;
//! everything goes through [`FairnessEngine`].

use crate::config::{FairnessConfig, RotationPolicy};
use crate::engine::FairnessEngine;
use crate::errors::{FairnessError, FairnessResult};
use crate::games::derivation::derive_outcome;
use crate::games::payout::{validate_bet, validate_prediction};
use crate::games::types::{GameType, Prediction, RoundRecord};
use crate::games::{verify_round, PayoutPolicy};
use crate::metrics::FairnessMetrics;
use crate::persistence::PersistenceHandle;
use crate::seeds::{RevealedSeed, SeedCommitment};
use crate::session_store::SessionStore;
use crate::stats::GameStats;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// History and statistics for one game type
#[derive(Debug, Clone, Default)]
struct GameSlice {
    /// Newest first
    history: VecDeque<RoundRecord>,
    stats: GameStats,
}

/// A settled round, plus the seed revealed if the round closed its epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub record: RoundRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated: Option<RevealedSeed>,
}

/// Build an engine from persisted state.
///
/// A stored seed pair is adopted only after its commitment checks out; a stored
/// client seed alone is carried into a fresh pair.
pub fn restore_engine(config: &FairnessConfig, store: &dyn SessionStore) -> FairnessResult<FairnessEngine> {
    let engine = FairnessEngine::new(config.seeds.clone());

    if config.storage.persist_seed_pair {
        if let Some(pair) = store.load_seed_pair()? {
            engine.restore(pair)?;
            return Ok(engine);
        }
    }

    if let Some(client_seed) = store.load_client_seed()? {
        if let Err(e) = engine.restore_client_seed(&client_seed) {
            warn!(error = %e, "Ignoring persisted client seed");
        }
    }
    engine.initialize()?;
    Ok(engine)
}

pub struct GameSession {
    engine: Arc<FairnessEngine>,
    payouts: PayoutPolicy,
    rotation: RotationPolicy,
    history_cap: usize,
    persist_seed_pair: bool,
    persist_rounds: bool,
    games: Mutex<HashMap<GameType, GameSlice>>,
    persistence: Option<PersistenceHandle>,
    metrics: Option<FairnessMetrics>,
}

impl GameSession {
    pub fn new(engine: Arc<FairnessEngine>, config: &FairnessConfig) -> Self {
        Self {
            engine,
            payouts: config.payouts.clone(),
            rotation: config.rotation,
            history_cap: config.history.max_entries.max(1),
            persist_seed_pair: config.storage.persist_seed_pair,
            persist_rounds: config.storage.persist_rounds,
            games: Mutex::new(HashMap::new()),
            persistence: None,
            metrics: None,
        }
    }

    pub fn with_persistence(mut self, handle: PersistenceHandle) -> Self {
        self.persistence = Some(handle);
        self
    }

    pub fn with_metrics(mut self, metrics: FairnessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reload per-game history and statistics from `store`.
    ///
    /// History comes back newest first, capped as in play. Statistics use the
    /// persisted aggregate when there is one, so totals include rounds older
    /// than the history cap; otherwise they are rebuilt from the history.
    pub fn restore_history(&self, store: &dyn SessionStore) -> FairnessResult<()> {
        let mut games = self.games.lock()?;
        for game_type in GameType::ALL {
            let history: VecDeque<RoundRecord> = store.recent_rounds(game_type, self.history_cap)?.into();
            let stats = match store.load_stats(game_type)? {
                Some(stats) => stats,
                None => GameStats::from_history(history.iter().rev()),
            };
            if history.is_empty() && stats.total_games == 0 {
                continue;
            }
            info!(
                game = %game_type,
                rounds = history.len(),
                total_games = stats.total_games,
                "Restored game history"
            );
            games.insert(game_type, GameSlice { history, stats });
        }
        Ok(())
    }

    pub fn commitment(&self) -> FairnessResult<SeedCommitment> {
        self.engine.commit_seed_pair()
    }

    /// Play one round.
    ///
    /// Nothing is recorded unless the outcome was derived and settled; a failure
    /// part way leaves history and statistics as they were.
    pub fn play(
        &self,
        game_type: GameType,
        bet_amount: f64,
        prediction: Prediction,
        client_seed_override: Option<&str>,
    ) -> FairnessResult<RoundOutcome> {
        validate_bet(bet_amount)?;
        validate_prediction(game_type, &prediction)?;

        // Rotation, if due, happens inside the capture; a failure there means no
        // round was issued, so there is nothing to record.
        let (fair, rotated) = self
            .engine
            .capture_round_with_rotation(client_seed_override, &self.rotation)
            .map_err(|e| {
                if e.is_integrity_failure() {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_integrity_failure();
                    }
                }
                e
            })?;
        let outcome = derive_outcome(game_type, &fair.server_seed, &fair.client_seed, fair.nonce)?;
        let settlement = self.payouts.settle(bet_amount, &prediction, &outcome)?;

        let record = RoundRecord {
            id: Uuid::new_v4(),
            game_type,
            bet_amount,
            prediction,
            outcome,
            won: settlement.won,
            payout: settlement.payout,
            timestamp: chrono::Utc::now().timestamp_millis(),
            fair,
        };

        {
            let mut games = self.games.lock()?;
            let slice = games.entry(game_type).or_default();
            slice.history.push_front(record.clone());
            slice.history.truncate(self.history_cap);
            slice.stats.record(&record);
            // queued under the lock so snapshots reach the store in order
            if let Some(persistence) = self.persistence.as_ref().filter(|_| self.persist_rounds) {
                persistence.submit_round(record.clone());
                persistence.submit_stats(game_type, slice.stats.clone());
            }
        }

        debug!(
            game = %game_type,
            nonce = record.fair.nonce,
            outcome = %record.outcome,
            won = record.won,
            payout = record.payout,
            "Round settled"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_round(game_type.as_str(), record.won);
        }
        if let Some(revealed) = &rotated {
            info!(
                previous_hash = %revealed.previous_hash,
                rounds_played = revealed.rounds_played,
                "Epoch closed by rotation policy"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_rotation();
            }
        }
        self.persist_seed_pair();

        Ok(RoundOutcome { record, rotated })
    }

    /// Reveal the current server seed and commit a new one
    pub fn rotate_seed_pair(&self) -> FairnessResult<RevealedSeed> {
        let revealed = self.engine.rotate_seed_pair().map_err(|e| {
            if e.is_integrity_failure() {
                if let Some(metrics) = &self.metrics {
                    metrics.record_integrity_failure();
                }
            }
            e
        })?;
        if let Some(metrics) = &self.metrics {
            metrics.record_rotation();
        }
        self.persist_seed_pair();
        Ok(revealed)
    }

    pub fn set_client_seed(&self, seed: &str) -> FairnessResult<()> {
        self.engine.set_client_seed(seed)?;
        if let Some(persistence) = &self.persistence {
            persistence.submit_client_seed(seed.to_string());
        }
        self.persist_seed_pair();
        Ok(())
    }

    /// Verify a round from this session.
    ///
    /// Returns `None` while the round's epoch is still open: its server seed has
    /// not been revealed, so nobody can check it yet.
    pub fn verify_round(&self, record: &RoundRecord) -> FairnessResult<Option<bool>> {
        let Some(revealed) = self.engine.revealed_for(&record.fair.server_seed_hash)? else {
            return Ok(None);
        };

        let result = verify_round(record, &revealed);
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(true) => metrics.record_verification("match"),
                Ok(false) => metrics.record_verification("mismatch"),
                Err(e) => {
                    if e.is_integrity_failure() {
                        metrics.record_integrity_failure();
                    }
                    metrics.record_verification("error");
                }
            }
        }
        if let Err(e) = &result {
            if e.is_integrity_failure() {
                error!(round = %record.id, error = %e, "Round failed commitment check");
            }
        }
        result.map(Some)
    }

    /// Recent rounds of one game, newest first
    pub fn history(&self, game_type: GameType) -> FairnessResult<Vec<RoundRecord>> {
        let games = self.games.lock()?;
        Ok(games
            .get(&game_type)
            .map(|slice| slice.history.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn stats(&self, game_type: GameType) -> FairnessResult<GameStats> {
        let games = self.games.lock()?;
        Ok(games
            .get(&game_type)
            .map(|slice| slice.stats.clone())
            .unwrap_or_default())
    }

    /// Drop the in-memory history of one game; the persisted round log is kept
    pub fn clear_history(&self, game_type: GameType) -> FairnessResult<()> {
        if let Some(slice) = self.games.lock()?.get_mut(&game_type) {
            slice.history.clear();
        }
        Ok(())
    }

    /// Zero the statistics of one game, in the store as well
    pub fn reset_stats(&self, game_type: GameType) -> FairnessResult<()> {
        let mut games = self.games.lock()?;
        if let Some(slice) = games.get_mut(&game_type) {
            slice.stats = GameStats::default();
            if let Some(persistence) = self.persistence.as_ref().filter(|_| self.persist_rounds) {
                persistence.submit_stats(game_type, GameStats::default());
            }
        }
        Ok(())
    }

    /// Queue the current client seed and, when enabled, the seed pair for storage
    pub fn checkpoint(&self) -> FairnessResult<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        if let Some(client_seed) = self.engine.client_seed()? {
            persistence.submit_client_seed(client_seed);
        }
        self.persist_seed_pair();
        Ok(())
    }

    fn persist_seed_pair(&self) {
        if !self.persist_seed_pair {
            return;
        }
        let Some(persistence) = &self.persistence else {
            return;
        };
        match self
            .engine
            .with_seed_pair(|pair| persistence.submit_seed_pair(pair.clone()))
        {
            Ok(()) | Err(FairnessError::NotInitialized) => {}
            Err(e) => warn!(error = %e, "Could not snapshot seed pair for persistence"),
        }
    }
}
