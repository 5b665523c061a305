//! Running per-game statistics

use crate::games::types::RoundRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GameStats {
    pub total_games: u64,
    pub wins: u64,
    pub total_wagered: f64,
    pub total_won: f64,
    pub biggest_win: f64,
    /// Positive for a run of wins, negative for a run of losses
    pub current_streak: i64,
    /// Longest run of either kind
    pub best_streak: u64,
    /// Percentage of rounds won
    pub win_rate: f64,
    pub profit_loss: f64,
}

impl GameStats {
    /// Fold one completed round into the aggregate
    pub fn record(&mut self, round: &RoundRecord) {
        self.total_games += 1;
        self.total_wagered += round.bet_amount;

        if round.won {
            self.wins += 1;
            self.total_won += round.payout;
            self.current_streak = if self.current_streak >= 0 {
                self.current_streak + 1
            } else {
                1
            };
            self.biggest_win = self.biggest_win.max(round.payout);
        } else {
            self.current_streak = if self.current_streak <= 0 {
                self.current_streak - 1
            } else {
                -1
            };
        }

        self.best_streak = self.best_streak.max(self.current_streak.unsigned_abs());
        self.win_rate = if self.total_games > 0 {
            self.wins as f64 / self.total_games as f64 * 100.0
        } else {
            0.0
        };
        self.profit_loss = self.total_won - self.total_wagered;
    }

    /// Recompute from scratch; `rounds` must be oldest first.
    pub fn from_history<'a, I>(rounds: I) -> Self
    where
        I: IntoIterator<Item = &'a RoundRecord>,
    {
        let mut stats = Self::default();
        for round in rounds {
            stats.record(round);
        }
        stats
    }

    pub fn losses(&self) -> u64 {
        self.total_games - self.wins
    }
}
