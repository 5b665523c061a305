//! Persisted session state.
//!
//! The client seed must survive reloads. The seed pair and round records are
//! optional; a restored pair is only trusted after its commitment is re-checked.

use crate::errors::{FairnessError, FairnessResult, StorageError};
use crate::games::types::{GameType, RoundRecord};
use crate::seeds::SeedPair;
use crate::stats::GameStats;
use crate::storage::OptimizedStorage;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

const CLIENT_SEED_KEY: &[u8] = b"session:client_seed";
const SEED_PAIR_KEY: &[u8] = b"session:seed_pair";
const STATS_PREFIX: &str = "session:stats:";
const ROUND_PREFIX: &str = "round:";

/// Storage backend for one player session
pub trait SessionStore: Send + Sync {
    fn load_client_seed(&self) -> FairnessResult<Option<String>>;

    fn save_client_seed(&self, client_seed: &str) -> FairnessResult<()>;

    /// Load the persisted pair; fails with `IntegrityMismatch` if it was tampered with
    fn load_seed_pair(&self) -> FairnessResult<Option<SeedPair>>;

    fn save_seed_pair(&self, pair: &SeedPair) -> FairnessResult<()>;

    /// Running statistics of one game, covering rounds beyond the history cap
    fn load_stats(&self, game_type: GameType) -> FairnessResult<Option<GameStats>>;

    fn save_stats(&self, game_type: GameType, stats: &GameStats) -> FairnessResult<()>;

    fn append_round(&self, record: &RoundRecord) -> FairnessResult<()>;

    /// Most recent rounds of one game, newest first
    fn recent_rounds(&self, game_type: GameType, limit: usize) -> FairnessResult<Vec<RoundRecord>>;
}

/// Newest-first key: prefix | game | inverted timestamp | inverted nonce | id
fn round_key(record: &RoundRecord) -> Vec<u8> {
    let inv_ts = u64::MAX - record.timestamp.max(0) as u64;
    let inv_nonce = u64::MAX - record.fair.nonce;
    format!(
        "{}{}:{:020}:{:020}:{}",
        ROUND_PREFIX,
        record.game_type,
        inv_ts,
        inv_nonce,
        record.id.simple()
    )
    .into_bytes()
}

fn stats_key(game_type: GameType) -> Vec<u8> {
    format!("{}{}", STATS_PREFIX, game_type).into_bytes()
}

fn round_prefix(game_type: GameType) -> Vec<u8> {
    format!("{}{}:", ROUND_PREFIX, game_type).into_bytes()
}

fn encode<T: Serialize>(what: &str, value: &T) -> FairnessResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| StorageError::WriteFailed(format!("Failed to encode {}: {}", what, e)).into())
}

fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> FairnessResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::CorruptedData(format!("Failed to decode {}: {}", what, e)).into())
}

fn checked_pair(pair: SeedPair) -> FairnessResult<SeedPair> {
    pair.check_integrity().map_err(|e| {
        tracing::error!(
            server_seed_hash = %pair.server_seed_hash,
            "Persisted server seed does not match its commitment"
        );
        e
    })?;
    Ok(pair)
}

/// RocksDB-backed session store
#[derive(Clone)]
pub struct RocksSessionStore {
    storage: OptimizedStorage,
}

impl RocksSessionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> FairnessResult<Self> {
        Ok(Self {
            storage: OptimizedStorage::new(path)?,
        })
    }
}

impl SessionStore for RocksSessionStore {
    fn load_client_seed(&self) -> FairnessResult<Option<String>> {
        match self.storage.get(CLIENT_SEED_KEY)? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                FairnessError::Storage(StorageError::CorruptedData(format!(
                    "client seed is not UTF-8: {}",
                    e
                )))
            }),
            None => Ok(None),
        }
    }

    fn save_client_seed(&self, client_seed: &str) -> FairnessResult<()> {
        self.storage.put(CLIENT_SEED_KEY, client_seed.as_bytes())
    }

    fn load_seed_pair(&self) -> FairnessResult<Option<SeedPair>> {
        let Some(bytes) = self.storage.get(SEED_PAIR_KEY)? else {
            return Ok(None);
        };
        let pair: SeedPair = decode("seed pair", &bytes)?;
        checked_pair(pair).map(Some)
    }

    fn save_seed_pair(&self, pair: &SeedPair) -> FairnessResult<()> {
        let bytes = encode("seed pair", pair)?;
        self.storage.batch_write(&[
            (SEED_PAIR_KEY.to_vec(), bytes),
            (CLIENT_SEED_KEY.to_vec(), pair.client_seed.as_bytes().to_vec()),
        ])
    }

    fn load_stats(&self, game_type: GameType) -> FairnessResult<Option<GameStats>> {
        match self.storage.get(&stats_key(game_type))? {
            Some(bytes) => decode("game stats", &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save_stats(&self, game_type: GameType, stats: &GameStats) -> FairnessResult<()> {
        let bytes = encode("game stats", stats)?;
        self.storage.put(&stats_key(game_type), &bytes)
    }

    fn append_round(&self, record: &RoundRecord) -> FairnessResult<()> {
        let bytes = encode("round record", record)?;
        self.storage.put(&round_key(record), &bytes)
    }

    fn recent_rounds(&self, game_type: GameType, limit: usize) -> FairnessResult<Vec<RoundRecord>> {
        self.storage
            .scan_prefix(&round_prefix(game_type), limit)?
            .into_iter()
            .map(|(_key, value)| decode("round record", &value))
            .collect()
    }
}

#[derive(Default)]
struct MemoryState {
    client_seed: Option<String>,
    seed_pair: Option<SeedPair>,
    stats: HashMap<GameType, GameStats>,
    rounds: BTreeMap<Vec<u8>, RoundRecord>,
}

/// In-process store for ephemeral sessions and tests
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<MemoryState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rounds held across all games
    pub fn round_count(&self) -> FairnessResult<usize> {
        Ok(self.state.lock()?.rounds.len())
    }
}

impl SessionStore for MemorySessionStore {
    fn load_client_seed(&self) -> FairnessResult<Option<String>> {
        Ok(self.state.lock()?.client_seed.clone())
    }

    fn save_client_seed(&self, client_seed: &str) -> FairnessResult<()> {
        self.state.lock()?.client_seed = Some(client_seed.to_string());
        Ok(())
    }

    fn load_seed_pair(&self) -> FairnessResult<Option<SeedPair>> {
        let pair = self.state.lock()?.seed_pair.clone();
        pair.map(checked_pair).transpose()
    }

    fn save_seed_pair(&self, pair: &SeedPair) -> FairnessResult<()> {
        let mut state = self.state.lock()?;
        state.client_seed = Some(pair.client_seed.clone());
        state.seed_pair = Some(pair.clone());
        Ok(())
    }

    fn load_stats(&self, game_type: GameType) -> FairnessResult<Option<GameStats>> {
        Ok(self.state.lock()?.stats.get(&game_type).cloned())
    }

    fn save_stats(&self, game_type: GameType, stats: &GameStats) -> FairnessResult<()> {
        self.state.lock()?.stats.insert(game_type, stats.clone());
        Ok(())
    }

    fn append_round(&self, record: &RoundRecord) -> FairnessResult<()> {
        self.state.lock()?.rounds.insert(round_key(record), record.clone());
        Ok(())
    }

    fn recent_rounds(&self, game_type: GameType, limit: usize) -> FairnessResult<Vec<RoundRecord>> {
        let prefix = round_prefix(game_type);
        let state = self.state.lock()?;
        Ok(state
            .rounds
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{GameOutcome, Prediction, ProvableFairData};
    use crate::seeds::hash_server_seed;
    use uuid::Uuid;

    fn record(game_type: GameType, timestamp: i64) -> RoundRecord {
        let outcome = match game_type {
            GameType::Slots => GameOutcome::Slots([1, 2, 3]),
            GameType::DiceRoll => GameOutcome::DiceRoll(50),
            GameType::CoinFlip => GameOutcome::CoinFlip(crate::games::types::CoinChoice::Heads),
        };
        RoundRecord {
            id: Uuid::new_v4(),
            game_type,
            bet_amount: 1.0,
            prediction: Prediction::Slots,
            outcome,
            won: false,
            payout: 0.0,
            timestamp,
            fair: ProvableFairData {
                server_seed: "server".to_string(),
                server_seed_hash: hash_server_seed("server"),
                client_seed: "client".to_string(),
                nonce: timestamp as u64,
            },
        }
    }

    fn exercise_store(store: &dyn SessionStore) {
        assert_eq!(store.load_client_seed().unwrap(), None);
        store.save_client_seed("persisted").unwrap();
        assert_eq!(store.load_client_seed().unwrap().as_deref(), Some("persisted"));

        let pair = SeedPair::generate(32, "paired".to_string()).unwrap();
        store.save_seed_pair(&pair).unwrap();
        assert_eq!(store.load_seed_pair().unwrap(), Some(pair));
        assert_eq!(store.load_client_seed().unwrap().as_deref(), Some("paired"));

        for ts in [10, 30, 20] {
            store.append_round(&record(GameType::Slots, ts)).unwrap();
        }
        store.append_round(&record(GameType::DiceRoll, 40)).unwrap();

        let recent = store.recent_rounds(GameType::Slots, 10).unwrap();
        let stamps: Vec<i64> = recent.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![30, 20, 10]);
        assert_eq!(store.recent_rounds(GameType::Slots, 2).unwrap().len(), 2);
        assert_eq!(store.recent_rounds(GameType::DiceRoll, 10).unwrap().len(), 1);
        assert!(store.recent_rounds(GameType::CoinFlip, 10).unwrap().is_empty());

        assert_eq!(store.load_stats(GameType::Slots).unwrap(), None);
        let mut stats = GameStats::default();
        stats.record(&record(GameType::Slots, 50));
        store.save_stats(GameType::Slots, &stats).unwrap();
        assert_eq!(store.load_stats(GameType::Slots).unwrap(), Some(stats));
        assert_eq!(store.load_stats(GameType::DiceRoll).unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&MemorySessionStore::new());
    }

    #[test]
    fn test_rocks_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksSessionStore::open(dir.path()).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_tampered_pair_is_rejected_on_load() {
        let store = MemorySessionStore::new();
        let mut pair = SeedPair::generate(32, "client".to_string()).unwrap();
        pair.server_seed = "replaced".to_string();
        store.save_seed_pair(&pair).unwrap();

        assert!(store.load_seed_pair().unwrap_err().is_integrity_failure());
    }
}
