use crate::errors::{FairnessError, FairnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    CoinFlip,
    DiceRoll,
    Slots,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::CoinFlip, GameType::DiceRoll, GameType::Slots];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::CoinFlip => "coinflip",
            GameType::DiceRoll => "diceroll",
            GameType::Slots => "slots",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = FairnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coinflip" | "coin-flip" | "coin" => Ok(GameType::CoinFlip),
            "diceroll" | "dice-roll" | "dice" => Ok(GameType::DiceRoll),
            "slots" | "slot" => Ok(GameType::Slots),
            other => Err(FairnessError::UnsupportedGameType(other.to_string())),
        }
    }
}

/// Coin flip side, both as a prediction and as a result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CoinChoice {
    Heads,
    Tails,
}

impl fmt::Display for CoinChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinChoice::Heads => write!(f, "heads"),
            CoinChoice::Tails => write!(f, "tails"),
        }
    }
}

impl FromStr for CoinChoice {
    type Err = FairnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heads" | "h" => Ok(CoinChoice::Heads),
            "tails" | "t" => Ok(CoinChoice::Tails),
            other => Err(FairnessError::InvalidPrediction(format!(
                "unknown coin side '{}'",
                other
            ))),
        }
    }
}

/// Which side of the dice target the player bets on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiceDirection {
    Over,
    Under,
}

/// A player's call for one round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum Prediction {
    CoinFlip { choice: CoinChoice },
    DiceRoll { target: u8, direction: DiceDirection },
    /// Slots have no call; the reels either line up or they don't
    Slots,
}

impl Prediction {
    pub fn game_type(&self) -> GameType {
        match self {
            Prediction::CoinFlip { .. } => GameType::CoinFlip,
            Prediction::DiceRoll { .. } => GameType::DiceRoll,
            Prediction::Slots => GameType::Slots,
        }
    }
}

/// Derived game outcome; the shape depends on the game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    CoinFlip(CoinChoice),
    /// Roll in [1, 100]
    DiceRoll(u8),
    /// Reel symbols, each in [0, 6]
    Slots([u8; 3]),
}

impl GameOutcome {
    /// Human-readable shape name, used in shape mismatch errors
    pub fn shape(&self) -> &'static str {
        match self {
            GameOutcome::CoinFlip(_) => "coin side",
            GameOutcome::DiceRoll(_) => "single roll",
            GameOutcome::Slots(_) => "three reels",
        }
    }

    pub fn game_type(&self) -> GameType {
        match self {
            GameOutcome::CoinFlip(_) => GameType::CoinFlip,
            GameOutcome::DiceRoll(_) => GameType::DiceRoll,
            GameOutcome::Slots(_) => GameType::Slots,
        }
    }
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::CoinFlip(side) => write!(f, "{}", side),
            GameOutcome::DiceRoll(roll) => write!(f, "{}", roll),
            GameOutcome::Slots([a, b, c]) => write!(f, "{},{},{}", a, b, c),
        }
    }
}

/// Parses the textual form a player copies out of a round record: `heads`,
/// `42` or `5,2,1`. The shape is inferred from the text, not from a game.
impl FromStr for GameOutcome {
    type Err = FairnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(side) = s.parse::<CoinChoice>() {
            return Ok(GameOutcome::CoinFlip(side));
        }

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let numbers = parts
            .iter()
            .map(|p| p.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FairnessError::InvalidPrediction(format!("cannot parse outcome '{}': {}", s, e)))?;

        match numbers.as_slice() {
            [roll] => Ok(GameOutcome::DiceRoll(*roll)),
            [a, b, c] => Ok(GameOutcome::Slots([*a, *b, *c])),
            _ => Err(FairnessError::InvalidPrediction(format!(
                "outcome '{}' has {} components",
                s,
                numbers.len()
            ))),
        }
    }
}

/// The exact seed tuple a round was derived from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvableFairData {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// Immutable log entry for a completed round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub id: Uuid,
    pub game_type: GameType,
    pub bet_amount: f64,
    pub prediction: Prediction,
    pub outcome: GameOutcome,
    pub won: bool,
    pub payout: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub fair: ProvableFairData,
}

/// Win flag and payout for one settled round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub won: bool,
    pub payout: f64,
}

pub(crate) fn ensure_game(expected: GameType, actual: GameType) -> FairnessResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(FairnessError::InvalidPrediction(format!(
            "prediction for {} used in a {} round",
            actual, expected
        )))
    }
}
