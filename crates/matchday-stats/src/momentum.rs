use matchday_ledger::MatchState;
use matchday_types::{
    config::MomentumConfig,
    ledger::{EventType, TeamSide},
    stats::MomentumSnapshot,
};
use serde::{Deserialize, Serialize};

/// Signed contribution of each entry kind to its side's tally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumWeights {
    pub goal: f64,
    pub yellow_card: f64,
    pub sin_bin: f64,
    pub red_card: f64,
    pub penalty: f64,
    pub offside: f64,
}

impl Default for MomentumWeights {
    fn default() -> Self {
        Self {
            goal: 3.0,
            yellow_card: -1.0,
            sin_bin: -1.5,
            red_card: -2.0,
            penalty: 1.5,
            offside: -0.5,
        }
    }
}

impl MomentumWeights {
    pub fn from_config(config: &MomentumConfig) -> Self {
        Self {
            goal: config.goal_weight,
            ..Self::default()
        }
    }

    pub fn for_event(&self, kind: EventType) -> f64 {
        match kind {
            EventType::YellowCard => self.yellow_card,
            EventType::SinBin => self.sin_bin,
            EventType::RedCard => self.red_card,
            EventType::Penalty => self.penalty,
            EventType::Offside => self.offside,
            EventType::Foul
            | EventType::PenaltyMiss
            | EventType::FreeKick
            | EventType::Corner
            | EventType::ThrowIn
            | EventType::GoalKick
            | EventType::Substitution
            | EventType::Injury
            | EventType::Incident
            | EventType::Other
            | EventType::HalfTime
            | EventType::FullTime => 0.0,
        }
    }
}

/// Pressure tallies over `[max(0, elapsed - window), elapsed]`.
///
/// Pure: reads the ledger only and returns the same snapshot for the same
/// inputs.
pub fn compute_momentum(
    state: &MatchState,
    elapsed_seconds: u64,
    window_seconds: u64,
    weights: &MomentumWeights,
) -> MomentumSnapshot {
    let window_end = elapsed_seconds;
    let window_start = window_end.saturating_sub(window_seconds);
    let in_window = |raw_time: u32| (window_start..=window_end).contains(&u64::from(raw_time));

    let mut snapshot = MomentumSnapshot::neutral(window_start, window_end);
    let mut credit = |side: TeamSide, weight: f64| match side {
        TeamSide::Team1 => snapshot.team1_score += weight,
        TeamSide::Team2 => snapshot.team2_score += weight,
    };

    for goal in state.goals() {
        if goal.counts() && in_window(goal.raw_time) {
            credit(goal.team, weights.goal);
        }
    }
    for event in state.events() {
        if event.is_system_event || !in_window(event.raw_time) {
            continue;
        }
        let weight = weights.for_event(event.event_type);
        if weight != 0.0 {
            credit(state.attribute_event(event), weight);
        }
    }
    snapshot
}

/// Momentum with the configured window and weights.
#[derive(Debug, Clone)]
pub struct MomentumEngine {
    window_seconds: u64,
    weights: MomentumWeights,
}

impl MomentumEngine {
    pub fn new(config: &MomentumConfig) -> Self {
        Self {
            window_seconds: config.window_secs,
            weights: MomentumWeights::from_config(config),
        }
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn compute(&self, state: &MatchState, elapsed_seconds: u64) -> MomentumSnapshot {
        self.compute_with_window(state, elapsed_seconds, self.window_seconds)
    }

    pub fn compute_with_window(
        &self,
        state: &MatchState,
        elapsed_seconds: u64,
        window_seconds: u64,
    ) -> MomentumSnapshot {
        compute_momentum(state, elapsed_seconds, window_seconds, &self.weights)
    }
}

impl Default for MomentumEngine {
    fn default() -> Self {
        Self::new(&MomentumConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchday_types::{
        config::LedgerConfig,
        ledger::{Goal, MatchEvent},
    };

    fn state() -> MatchState {
        MatchState::new(LedgerConfig::default(), 4200)
    }

    #[test]
    fn empty_ledger_is_neutral() {
        let momentum = MomentumEngine::default().compute(&state(), 1000);
        assert_eq!(momentum, MomentumSnapshot::neutral(700, 1000));
        assert_eq!(momentum.team1_percentage(), 50.0);
    }

    #[test]
    fn window_is_clamped_at_kick_off() {
        let momentum = MomentumEngine::default().compute(&state(), 120);
        assert_eq!((momentum.window_start, momentum.window_end), (0, 120));
    }

    #[test]
    fn only_entries_inside_the_window_count() {
        let mut state = state();
        state
            .add_goal(Goal::new(100, "Early", TeamSide::Team1, "Home"))
            .unwrap();
        state
            .add_goal(Goal::new(700, "Edge", TeamSide::Team2, "Away"))
            .unwrap();
        state
            .add_goal(Goal::new(1000, "Now", TeamSide::Team2, "Away"))
            .unwrap();
        state
            .add_goal(Goal::new(1001, "Future", TeamSide::Team1, "Home"))
            .unwrap();

        let momentum = MomentumEngine::default().compute(&state, 1000);
        assert_eq!(momentum.team1_score, 0.0);
        assert_eq!(momentum.team2_score, 6.0);
    }

    #[test]
    fn disallowed_goals_and_system_events_are_ignored() {
        let mut state = state();
        let mut goal = Goal::new(50, "A", TeamSide::Team1, "Home");
        goal.disallowed = true;
        goal.disallowed_reason = Some("offside".into());
        state.add_goal(goal).unwrap();
        state
            .add_event(MatchEvent::system(60, EventType::FullTime, "Home 0 - 0 Away"))
            .unwrap();
        let momentum = MomentumEngine::default().compute(&state, 100);
        assert_eq!(momentum, MomentumSnapshot::neutral(0, 100));
    }

    #[test]
    fn events_use_signed_weights_per_side() {
        let mut state = state();
        state
            .add_event(MatchEvent::new(10, EventType::YellowCard).with_team(TeamSide::Team2, "Away"))
            .unwrap();
        state
            .add_event(MatchEvent::new(20, EventType::Penalty).with_team(TeamSide::Team1, "Home"))
            .unwrap();
        state
            .add_event(MatchEvent::new(30, EventType::Offside).with_team(TeamSide::Team1, "Home"))
            .unwrap();
        state
            .add_event(MatchEvent::new(40, EventType::Corner).with_team(TeamSide::Team2, "Away"))
            .unwrap();

        let momentum = MomentumEngine::default().compute(&state, 60);
        assert_eq!(momentum.team1_score, 1.0);
        assert_eq!(momentum.team2_score, -1.0);
    }

    #[test]
    fn unattributed_events_match_current_names() {
        let mut state = state();
        state.rename_team(TeamSide::Team2, "City").unwrap();
        state
            .add_event(MatchEvent::new(10, EventType::RedCard).with_notes("City keeper"))
            .unwrap();
        state
            .add_event(MatchEvent::new(20, EventType::YellowCard))
            .unwrap();
        let momentum = MomentumEngine::default().compute(&state, 60);
        assert_eq!(momentum.team2_score, -2.0);
        assert_eq!(momentum.team1_score, -1.0);
    }

    #[test]
    fn each_entry_contributes_at_most_its_weight_once() {
        let weights = MomentumWeights::default();
        let mut state = state();
        let mut bound = 0.0;
        for (idx, kind) in EventType::ALL
            .into_iter()
            .filter(|kind| !kind.is_phase_marker())
            .enumerate()
        {
            let side = if idx % 2 == 0 { TeamSide::Team1 } else { TeamSide::Team2 };
            state
                .add_event(MatchEvent::new(idx as u32, kind).with_team(side, "x"))
                .unwrap();
            bound += weights.for_event(kind).abs();
        }
        state
            .add_goal(Goal::new(5, "A", TeamSide::Team1, "Home"))
            .unwrap();
        bound += weights.goal;

        let first = compute_momentum(&state, 200, 300, &weights);
        let second = compute_momentum(&state, 200, 300, &weights);
        assert_eq!(first, second);
        let magnitude = first.team1_score.abs() + first.team2_score.abs();
        assert!(magnitude.is_finite());
        assert!(magnitude <= bound);
    }
}
