use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::TeamSide;

/// Aggregate counts derived from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub goals: u32,
    pub cards: u32,
    pub fouls: u32,
    pub penalties: u32,
    pub incidents: u32,
    pub total: u32,
    pub cache_key: String,
    pub computed_at: DateTime<Utc>,
}

impl StatisticsSnapshot {
    /// Compares the derived counts, ignoring when they were computed.
    pub fn same_counts(&self, other: &StatisticsSnapshot) -> bool {
        self.goals == other.goals
            && self.cards == other.cards
            && self.fouls == other.fouls
            && self.penalties == other.penalties
            && self.incidents == other.incidents
            && self.total == other.total
            && self.cache_key == other.cache_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub snapshot: StatisticsSnapshot,
    pub from_cache: bool,
}

/// Lowest and highest share shown for either side.
pub const MOMENTUM_FLOOR: f64 = 10.0;
pub const MOMENTUM_CEILING: f64 = 90.0;

/// Per-team pressure tallies over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumSnapshot {
    pub team1_score: f64,
    pub team2_score: f64,
    pub window_start: u64,
    pub window_end: u64,
}

impl MomentumSnapshot {
    pub fn neutral(window_start: u64, window_end: u64) -> Self {
        Self {
            team1_score: 0.0,
            team2_score: 0.0,
            window_start,
            window_end,
        }
    }

    pub fn score_for(&self, side: TeamSide) -> f64 {
        match side {
            TeamSide::Team1 => self.team1_score,
            TeamSide::Team2 => self.team2_score,
        }
    }

    /// Share of momentum held by team 1 as a percentage in `[10, 90]`.
    ///
    /// Tallies may be negative, so the share is the normalized difference
    /// around the 50 point rather than a plain ratio.
    pub fn team1_percentage(&self) -> f64 {
        let magnitude = self.team1_score.abs() + self.team2_score.abs();
        if magnitude == 0.0 || !magnitude.is_finite() {
            return 50.0;
        }
        let share = 50.0 + 50.0 * (self.team1_score - self.team2_score) / magnitude;
        share.clamp(MOMENTUM_FLOOR, MOMENTUM_CEILING)
    }

    pub fn team2_percentage(&self) -> f64 {
        100.0 - self.team1_percentage()
    }

    pub fn leader(&self) -> Option<TeamSide> {
        if self.team1_score > self.team2_score {
            Some(TeamSide::Team1)
        } else if self.team2_score > self.team1_score {
            Some(TeamSide::Team2)
        } else {
            None
        }
    }
}

/// Allowed goals per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scoreline {
    pub team1: u32,
    pub team2: u32,
}

impl Scoreline {
    pub fn for_side(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Team1 => self.team1,
            TeamSide::Team2 => self.team2,
        }
    }

    /// Text stored on phase markers, e.g. `Home 2 - 1 Away`.
    pub fn snapshot_text(&self, team1_name: &str, team2_name: &str) -> String {
        format!(
            "{} {} - {} {}",
            team1_name, self.team1, self.team2, team2_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_neutral_without_pressure() {
        let momentum = MomentumSnapshot::neutral(0, 300);
        assert_eq!(momentum.team1_percentage(), 50.0);
        assert_eq!(momentum.team2_percentage(), 50.0);
        assert_eq!(momentum.leader(), None);
    }

    #[test]
    fn percentage_is_bounded() {
        let one_sided = MomentumSnapshot {
            team1_score: 9.0,
            team2_score: 0.0,
            window_start: 0,
            window_end: 300,
        };
        assert_eq!(one_sided.team1_percentage(), 90.0);
        assert_eq!(one_sided.team2_percentage(), 10.0);

        let balanced = MomentumSnapshot {
            team1_score: 3.0,
            team2_score: 1.0,
            ..one_sided
        };
        assert_eq!(balanced.team1_percentage(), 75.0);
        assert_eq!(balanced.leader(), Some(TeamSide::Team1));

        let penalized = MomentumSnapshot {
            team1_score: -1.0,
            team2_score: 0.0,
            ..one_sided
        };
        assert_eq!(penalized.team1_percentage(), 10.0);
    }

    #[test]
    fn scoreline_text() {
        let score = Scoreline { team1: 2, team2: 1 };
        assert_eq!(score.snapshot_text("Home", "Away"), "Home 2 - 1 Away");
        assert_eq!(score.for_side(TeamSide::Team2), 1);
    }
}
