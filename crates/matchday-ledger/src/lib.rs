//! Match state aggregate and its event ledger.
//!
//! All goal and event lists are private; callers go through the mutation
//! API so bounds, shape and system-event rules are enforced in one place.
//! Read accessors hand out borrowed slices, which the borrow checker stops
//! from outliving the next mutation.

mod teams;
mod validation;

use matchday_types::{
    clock::MatchClock,
    config::LedgerConfig,
    events::TimelineItem,
    ledger::{EventPatch, EventType, Goal, GoalPatch, MatchEvent, TeamSide},
    record::MatchRecord,
    stats::Scoreline,
    LedgerList, MatchdayError, Result,
};
use tracing::{debug, warn};

pub use teams::TeamIdentity;
pub use validation::{validate_event, validate_goal, validation_error};

#[derive(Debug, Clone)]
pub struct MatchState {
    clock: MatchClock,
    goals: Vec<Goal>,
    events: Vec<MatchEvent>,
    teams: TeamIdentity,
    attendance: Vec<serde_json::Value>,
    limits: LedgerConfig,
}

impl MatchState {
    pub fn new(limits: LedgerConfig, regulation_duration: u64) -> Self {
        let teams = TeamIdentity::new(
            limits.team1_default_name.clone(),
            limits.team2_default_name.clone(),
        );
        Self {
            clock: MatchClock::new(regulation_duration),
            goals: Vec::new(),
            events: Vec::new(),
            teams,
            attendance: Vec::new(),
            limits,
        }
    }

    /// Rebuilds state from a stored record. Entries that no longer pass
    /// validation are dropped with a warning rather than failing the load.
    /// `regulation` is used when the record carries no game time.
    pub fn from_record(record: MatchRecord, limits: LedgerConfig, regulation: u64) -> Self {
        let clock = record.clock(regulation);
        let teams = TeamIdentity::from_histories(
            &record.team1_history,
            &record.team2_history,
            &limits.team1_default_name,
            &limits.team2_default_name,
        );
        let goals: Vec<Goal> = record
            .goals
            .into_iter()
            .enumerate()
            .filter_map(|(idx, goal)| match validate_goal(&goal, &limits) {
                Ok(()) => Some(goal),
                Err(err) => {
                    warn!("Dropping stored goal #{}: {}", idx, err);
                    None
                }
            })
            .collect();
        let events: Vec<MatchEvent> = record
            .match_events
            .into_iter()
            .enumerate()
            .filter_map(|(idx, event)| match validate_event(&event, &limits) {
                Ok(()) => Some(event),
                Err(err) => {
                    warn!("Dropping stored event #{}: {}", idx, err);
                    None
                }
            })
            .collect();
        Self {
            clock,
            goals,
            events,
            teams,
            attendance: record.attendance,
            limits,
        }
    }

    pub fn to_record(&self) -> MatchRecord {
        MatchRecord {
            elapsed_time: self.clock.elapsed_seconds,
            is_running: self.clock.is_running,
            start_timestamp: self.clock.start_anchor,
            game_time: Some(self.clock.regulation_duration),
            is_second_half: self.clock.is_second_half,
            has_started: Some(self.clock.has_started),
            goals: self.goals.clone(),
            match_events: self.events.clone(),
            team1_history: self.teams.history(TeamSide::Team1).to_vec(),
            team2_history: self.teams.history(TeamSide::Team2).to_vec(),
            attendance: self.attendance.clone(),
        }
    }

    /// Wholesale new-match reset. Team names go back to the configured
    /// defaults and the attendance list is cleared.
    pub fn reset(&mut self, regulation_duration: u64) {
        *self = Self::new(self.limits.clone(), regulation_duration);
        debug!("Match state reset ({}s regulation)", regulation_duration);
    }

    pub fn clock(&self) -> &MatchClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut MatchClock {
        &mut self.clock
    }

    pub fn limits(&self) -> &LedgerConfig {
        &self.limits
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    pub fn attendance(&self) -> &[serde_json::Value] {
        &self.attendance
    }

    pub fn teams(&self) -> &TeamIdentity {
        &self.teams
    }

    pub fn team_name(&self, side: TeamSide) -> &str {
        self.teams.current(side)
    }

    pub fn rename_team(&mut self, side: TeamSide, name: &str) -> Result<()> {
        self.teams.rename(side, name)?;
        debug!("{} renamed to {}", side, self.teams.current(side));
        Ok(())
    }

    pub fn add_goal(&mut self, goal: Goal) -> Result<usize> {
        validate_goal(&goal, &self.limits).inspect_err(log_rejection)?;
        self.goals.push(goal);
        debug!("Goal added ({} total)", self.goals.len());
        Ok(self.goals.len() - 1)
    }

    pub fn add_event(&mut self, event: MatchEvent) -> Result<usize> {
        validate_event(&event, &self.limits).inspect_err(log_rejection)?;
        debug!("{} event added at {}", event.event_type, event.display_time);
        self.events.push(event);
        Ok(self.events.len() - 1)
    }

    pub fn update_goal(&mut self, index: usize, patch: &GoalPatch) -> Result<&Goal> {
        let current = self.goal_at(index)?;
        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        validate_goal(&updated, &self.limits).inspect_err(log_rejection)?;
        self.goals[index] = updated;
        debug!("Goal #{} updated", index);
        Ok(&self.goals[index])
    }

    pub fn update_event(&mut self, index: usize, patch: &EventPatch) -> Result<&MatchEvent> {
        let current = self.manual_event_at(index)?;
        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        validate_event(&updated, &self.limits).inspect_err(log_rejection)?;
        self.events[index] = updated;
        debug!("Event #{} updated", index);
        Ok(&self.events[index])
    }

    /// Removes a goal. Every later index shifts down by one.
    pub fn remove_goal(&mut self, index: usize) -> Result<Goal> {
        self.goal_at(index)?;
        let removed = self.goals.remove(index);
        debug!("Goal #{} removed", index);
        Ok(removed)
    }

    /// Removes a manual event. Every later index shifts down by one.
    pub fn remove_event(&mut self, index: usize) -> Result<MatchEvent> {
        self.manual_event_at(index)?;
        let removed = self.events.remove(index);
        debug!("Event #{} removed", index);
        Ok(removed)
    }

    /// Flips a goal between allowed and disallowed. Disallowing needs a
    /// non-blank reason; re-allowing clears the reason and ignores any given.
    pub fn toggle_goal_disallowed(&mut self, index: usize, reason: Option<&str>) -> Result<&Goal> {
        let goal = self.goal_at(index)?;
        if goal.disallowed {
            let goal = &mut self.goals[index];
            goal.disallowed = false;
            goal.disallowed_reason = None;
            debug!("Goal #{} allowed again", index);
        } else {
            let reason = reason
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .ok_or_else(|| {
                    let err = MatchdayError::Invariant(
                        "a reason is required to disallow a goal".into(),
                    );
                    log_rejection(&err);
                    err
                })?;
            let goal = &mut self.goals[index];
            goal.disallowed = true;
            goal.disallowed_reason = Some(reason.to_string());
            debug!("Goal #{} disallowed: {}", index, reason);
        }
        Ok(&self.goals[index])
    }

    /// Goals then events, stably sorted by raw time. Ties keep goals before
    /// events and each list's insertion order.
    pub fn ordered_timeline(&self) -> Vec<TimelineItem> {
        let mut items: Vec<TimelineItem> = self
            .goals
            .iter()
            .enumerate()
            .map(|(index, goal)| TimelineItem::Goal {
                index,
                goal: goal.clone(),
            })
            .chain(
                self.events
                    .iter()
                    .enumerate()
                    .map(|(index, event)| TimelineItem::Event {
                        index,
                        event: event.clone(),
                    }),
            )
            .collect();
        items.sort_by_key(TimelineItem::raw_time);
        items
    }

    /// Allowed goals per side, by the side stored on each goal.
    pub fn score(&self) -> Scoreline {
        self.goals
            .iter()
            .filter(|goal| goal.counts())
            .fold(Scoreline::default(), |mut score, goal| {
                match goal.team {
                    TeamSide::Team1 => score.team1 += 1,
                    TeamSide::Team2 => score.team2 += 1,
                }
                score
            })
    }

    /// Score text for phase markers, using the current team names.
    pub fn score_text(&self) -> String {
        self.score().snapshot_text(
            self.team_name(TeamSide::Team1),
            self.team_name(TeamSide::Team2),
        )
    }

    /// Side an event counts for. Events without a recorded side fall back to
    /// matching their team name and notes against the current team names,
    /// then team 1.
    pub fn attribute_event(&self, event: &MatchEvent) -> TeamSide {
        event
            .team
            .or_else(|| self.teams.side_named_in(&event.attribution_text()))
            .unwrap_or(TeamSide::Team1)
    }

    pub fn has_event_of_type(&self, kind: EventType) -> bool {
        self.events.iter().any(|event| event.event_type == kind)
    }

    fn goal_at(&self, index: usize) -> Result<&Goal> {
        self.goals.get(index).ok_or_else(|| {
            let err = MatchdayError::IndexOutOfRange {
                list: LedgerList::Goals,
                index,
                len: self.goals.len(),
            };
            log_rejection(&err);
            err
        })
    }

    fn manual_event_at(&self, index: usize) -> Result<&MatchEvent> {
        let event = self.events.get(index).ok_or_else(|| {
            let err = MatchdayError::IndexOutOfRange {
                list: LedgerList::Events,
                index,
                len: self.events.len(),
            };
            log_rejection(&err);
            err
        })?;
        if event.is_system_event {
            let err = MatchdayError::ProtectedSystemEvent(index);
            log_rejection(&err);
            return Err(err);
        }
        Ok(event)
    }
}

fn log_rejection(err: &MatchdayError) {
    warn!("Ledger mutation rejected: {}", err);
}
