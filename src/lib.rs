//! Provably-fair outcome engine
//!
//! Commit-reveal seed lifecycle and deterministic outcome derivation for coin
//! flip, dice and slots. A round's result is a pure function of
//! `(server_seed, client_seed, nonce, game)`; the server seed is committed by its
//! SHA-256 hash before play and revealed on rotation, so any player can re-derive
//! every round of a closed epoch.

pub mod config;
pub mod engine;
pub mod errors;
pub mod games;
pub mod metrics;
pub mod persistence;
pub mod seeds;
pub mod session;
pub mod session_store;
pub mod stats;
pub mod storage;

pub use config::{ConfigLoader, FairnessConfig, RotationPolicy};
pub use engine::FairnessEngine;
pub use errors::{FairnessError, FairnessResult};
pub use games::{
    derive_outcome, verify, CoinChoice, DiceDirection, GameOutcome, GameType, PayoutPolicy,
    Prediction, ProvableFairData, RoundRecord,
};
pub use seeds::{hash_server_seed, RevealedSeed, SeedCommitment, SeedPair};
pub use session::{restore_engine, GameSession, RoundOutcome};
pub use session_store::{MemorySessionStore, RocksSessionStore, SessionStore};
pub use stats::GameStats;
