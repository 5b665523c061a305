//! Configuration management with validation and defaults
//!
//! Values come from an optional TOML file, then `FAIRNESS_*` environment
//! overrides, then validation.

use crate::errors::{ConfigurationError, FairnessResult};
use crate::games::PayoutPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FairnessConfig {
    pub seeds: SeedConfig,
    pub rotation: RotationPolicy,
    pub payouts: PayoutPolicy,
    pub history: HistoryConfig,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SeedConfig {
    pub server_seed_length: usize,
    pub client_seed_length: usize,
    pub max_client_seed_length: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            server_seed_length: 32,
            client_seed_length: 16,
            max_client_seed_length: 64,
        }
    }
}

/// When the server seed of the current epoch is rotated and revealed
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Only when the player asks
    Manual,
    /// Automatically once `rounds` nonces have been consumed; manual rotation still works
    EveryNRounds { rounds: u64 },
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy::EveryNRounds { rounds: 1000 }
    }
}

impl RotationPolicy {
    /// Whether an epoch that has consumed `rounds_played` nonces should close
    pub fn is_due(&self, rounds_played: u64) -> bool {
        match self {
            RotationPolicy::Manual => false,
            RotationPolicy::EveryNRounds { rounds } => rounds_played >= *rounds,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Rounds kept per game type; older entries are evicted
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 100 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    /// Persist the seed pair as well as the client seed
    pub persist_seed_pair: bool,
    /// Persist round records in the background
    pub persist_rounds: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/fairness_data".to_string(),
            persist_seed_pair: true,
            persist_rounds: true,
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> FairnessResult<FairnessConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            FairnessConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> FairnessResult<FairnessConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut FairnessConfig) -> FairnessResult<()> {
        if let Ok(data_dir) = env::var("FAIRNESS_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }
        if let Ok(rounds) = env::var("FAIRNESS_ROTATE_EVERY") {
            config.rotation = match rounds.trim() {
                "manual" | "0" => RotationPolicy::Manual,
                value => RotationPolicy::EveryNRounds {
                    rounds: parse_env("FAIRNESS_ROTATE_EVERY", value)?,
                },
            };
        }
        if let Ok(max) = env::var("FAIRNESS_HISTORY_MAX") {
            config.history.max_entries = parse_env("FAIRNESS_HISTORY_MAX", &max)?;
        }
        if let Ok(len) = env::var("FAIRNESS_SERVER_SEED_LENGTH") {
            config.seeds.server_seed_length = parse_env("FAIRNESS_SERVER_SEED_LENGTH", &len)?;
        }
        if let Ok(len) = env::var("FAIRNESS_CLIENT_SEED_LENGTH") {
            config.seeds.client_seed_length = parse_env("FAIRNESS_CLIENT_SEED_LENGTH", &len)?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &FairnessConfig) -> FairnessResult<()> {
        let seeds = &config.seeds;
        if seeds.server_seed_length == 0 {
            return Err(invalid("seeds.server_seed_length", "0", "Server seed length cannot be zero"));
        }
        if seeds.client_seed_length == 0 {
            return Err(invalid("seeds.client_seed_length", "0", "Client seed length cannot be zero"));
        }
        if seeds.max_client_seed_length < seeds.client_seed_length {
            return Err(invalid(
                "seeds.max_client_seed_length",
                &seeds.max_client_seed_length.to_string(),
                "Must be at least client_seed_length",
            ));
        }

        if let RotationPolicy::EveryNRounds { rounds: 0 } = config.rotation {
            return Err(invalid("rotation.rounds", "0", "Use mode = \"manual\" to disable rotation"));
        }

        if config.history.max_entries == 0 {
            return Err(invalid("history.max_entries", "0", "History cap cannot be zero"));
        }

        let payouts = &config.payouts;
        for (field, value) in [
            ("payouts.coin_flip_multiplier", payouts.coin_flip_multiplier),
            ("payouts.dice_edge_numerator", payouts.dice_edge_numerator),
            ("payouts.dice_max_multiplier", payouts.dice_max_multiplier),
            ("payouts.slots_top_multiplier", payouts.slots_top_multiplier),
            ("payouts.slots_step_multiplier", payouts.slots_step_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, &value.to_string(), "Multiplier must be a positive number"));
            }
        }

        if config.storage.data_directory.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_directory".to_string()).into());
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &FairnessConfig, path: &str) -> FairnessResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: &str) -> FairnessResult<T> {
    value.trim().parse().map_err(|_| {
        ConfigurationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Invalid number".to_string(),
        }
        .into()
    })
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::errors::FairnessError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FairnessConfig::default();
        assert_eq!(config.seeds.server_seed_length, 32);
        assert_eq!(config.seeds.client_seed_length, 16);
        assert_eq!(config.history.max_entries, 100);
        assert_eq!(config.rotation, RotationPolicy::EveryNRounds { rounds: 1000 });
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let loader = ConfigLoader::new();

        let mut config = FairnessConfig::default();
        config.history.max_entries = 0;
        assert!(loader.validate(&config).is_err());

        let mut config = FairnessConfig::default();
        config.rotation = RotationPolicy::EveryNRounds { rounds: 0 };
        assert!(loader.validate(&config).is_err());

        let mut config = FairnessConfig::default();
        config.payouts.coin_flip_multiplier = -1.0;
        assert!(loader.validate(&config).is_err());

        let mut config = FairnessConfig::default();
        config.seeds.max_client_seed_length = 4;
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_rotation_policy() {
        assert!(!RotationPolicy::Manual.is_due(u64::MAX));
        let every = RotationPolicy::EveryNRounds { rounds: 5 };
        assert!(!every.is_due(4));
        assert!(every.is_due(5));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: FairnessConfig = toml::from_str(
            r#"
            [rotation]
            mode = "manual"

            [payouts]
            coin_flip_multiplier = 1.9
            "#,
        )
        .unwrap();

        assert_eq!(config.rotation, RotationPolicy::Manual);
        assert_eq!(config.payouts.coin_flip_multiplier, 1.9);
        assert_eq!(config.payouts.dice_max_multiplier, 9.9);
        assert_eq!(config.history.max_entries, 100);
    }

    #[test]
    fn test_save_and_load_config() -> FairnessResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original = FairnessConfig::default();
        original.rotation = RotationPolicy::EveryNRounds { rounds: 250 };

        let loader = ConfigLoader::new();
        loader.save(&original, path)?;

        let loaded: FairnessConfig = toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, original);

        Ok(())
    }
}
