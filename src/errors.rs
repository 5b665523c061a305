//! Error types for the provably-fair engine
//!
//! Seed, derivation and verification failures live at the top level; configuration
//! and storage failures are nested so callers can match on the broad category.

use thiserror::Error;

/// Root error type for all engine, session and store operations
#[derive(Debug, Error)]
pub enum FairnessError {
    /// The OS random source could not be read. Seed generation aborts.
    #[error("Secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// A supplied seed was empty or malformed
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// A game type name that this engine does not know
    #[error("Unsupported game type: {0}")]
    UnsupportedGameType(String),

    /// A revealed server seed does not hash to its published commitment
    #[error("Commitment integrity mismatch: expected hash {expected}, revealed seed hashes to {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// A claimed outcome does not have the shape the game produces
    #[error("Outcome shape mismatch for {game}: expected {expected}, got {actual}")]
    OutcomeShapeMismatch {
        game: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid bet amount: {0}")]
    InvalidBet(String),

    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),

    /// The epoch committed under this hash has handed out every nonce; rotate
    #[error("Nonce space exhausted for server seed {0}")]
    NonceExhausted(String),

    /// A round was requested before any seed pair was committed
    #[error("Seed pair not initialized")]
    NotInitialized,

    /// A session lock was poisoned by a panicking holder
    #[error("Session state poisoned: {0}")]
    Poisoned(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

impl FairnessError {
    /// Integrity failures break the fairness claim for a whole epoch.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, FairnessError::IntegrityMismatch { .. })
    }

    /// Errors a player can fix by re-entering input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FairnessError::InvalidSeed(_)
                | FairnessError::InvalidBet(_)
                | FairnessError::InvalidPrediction(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for FairnessError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        FairnessError::Poisoned(e.to_string())
    }
}

// Convenience type alias for Results
pub type FairnessResult<T> = Result<T, FairnessError>;
