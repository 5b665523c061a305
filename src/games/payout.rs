//! Payout policy table
//!
//! The multipliers encode the house edge. They are business parameters and are
//! loaded from configuration rather than fixed in the derivation code.

use crate::errors::{FairnessError, FairnessResult};
use crate::games::derivation::{DICE_FACES, TOP_SYMBOL};
use crate::games::types::{ensure_game, DiceDirection, GameOutcome, GameType, Prediction, Settlement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PayoutPolicy {
    /// Paid on a correct coin flip call
    pub coin_flip_multiplier: f64,
    /// Dice multiplier is `dice_edge_numerator / chance%`
    pub dice_edge_numerator: f64,
    pub dice_max_multiplier: f64,
    /// Three top symbols
    pub slots_top_multiplier: f64,
    /// Three of any other symbol pay `(symbol + 1) * slots_step_multiplier`
    pub slots_step_multiplier: f64,
}

impl Default for PayoutPolicy {
    fn default() -> Self {
        Self {
            coin_flip_multiplier: 1.95,
            dice_edge_numerator: 98.0,
            dice_max_multiplier: 9.9,
            slots_top_multiplier: 100.0,
            slots_step_multiplier: 5.0,
        }
    }
}

/// Number of rolls in [1, 100] that win for this target and direction
pub fn dice_chance(target: u8, direction: DiceDirection) -> u32 {
    let target = target as u32;
    match direction {
        DiceDirection::Over => DICE_FACES.saturating_sub(target),
        DiceDirection::Under => target.saturating_sub(1).min(DICE_FACES),
    }
}

pub fn validate_bet(bet_amount: f64) -> FairnessResult<()> {
    if !bet_amount.is_finite() || bet_amount <= 0.0 {
        return Err(FairnessError::InvalidBet(format!(
            "bet amount must be greater than 0, got {}",
            bet_amount
        )));
    }
    Ok(())
}

/// Reject predictions that cannot be settled for `game_type`
pub fn validate_prediction(game_type: GameType, prediction: &Prediction) -> FairnessResult<()> {
    ensure_game(game_type, prediction.game_type())?;

    if let Prediction::DiceRoll { target, direction } = prediction {
        if *target == 0 || *target as u32 > DICE_FACES {
            return Err(FairnessError::InvalidPrediction(format!(
                "dice target {} outside [1, {}]",
                target, DICE_FACES
            )));
        }
        if dice_chance(*target, *direction) == 0 {
            return Err(FairnessError::InvalidPrediction(format!(
                "dice target {} {:?} can never win",
                target, direction
            )));
        }
    }
    Ok(())
}

impl PayoutPolicy {
    pub fn dice_multiplier(&self, target: u8, direction: DiceDirection) -> f64 {
        let chance = dice_chance(target, direction);
        if chance == 0 {
            return 0.0;
        }
        (self.dice_edge_numerator / chance as f64).min(self.dice_max_multiplier)
    }

    pub fn slots_multiplier(&self, symbol: u8) -> f64 {
        if symbol == TOP_SYMBOL {
            self.slots_top_multiplier
        } else {
            (symbol as f64 + 1.0) * self.slots_step_multiplier
        }
    }

    /// Decide win/loss and payout for a derived outcome
    pub fn settle(
        &self,
        bet_amount: f64,
        prediction: &Prediction,
        outcome: &GameOutcome,
    ) -> FairnessResult<Settlement> {
        validate_bet(bet_amount)?;
        validate_prediction(outcome.game_type(), prediction)?;

        let (won, multiplier) = match (prediction, outcome) {
            (Prediction::CoinFlip { choice }, GameOutcome::CoinFlip(side)) => {
                (choice == side, self.coin_flip_multiplier)
            }
            (Prediction::DiceRoll { target, direction }, GameOutcome::DiceRoll(roll)) => {
                let won = match direction {
                    DiceDirection::Over => roll > target,
                    DiceDirection::Under => roll < target,
                };
                (won, self.dice_multiplier(*target, *direction))
            }
            (Prediction::Slots, GameOutcome::Slots([a, b, c])) => {
                (a == b && b == c, self.slots_multiplier(*a))
            }
            (prediction, outcome) => {
                return Err(FairnessError::InvalidPrediction(format!(
                    "{} prediction cannot settle a {} outcome",
                    prediction.game_type(),
                    outcome.game_type()
                )))
            }
        };

        Ok(Settlement {
            won,
            payout: if won { bet_amount * multiplier } else { 0.0 },
        })
    }
}
