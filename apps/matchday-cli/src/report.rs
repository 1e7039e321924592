use std::fmt::Write as _;

use matchday_ledger::MatchState;
use matchday_tracker::MatchTracker;
use matchday_types::{
    clock::{format_display_time, ClockPhase},
    events::TimelineItem,
    ledger::{Goal, MatchEvent, TeamSide},
    stats::{MomentumSnapshot, StatisticsReport},
};

pub fn status(tracker: &MatchTracker) -> String {
    let clock = tracker.clock();
    let state = tracker.state();
    let phase = match clock.phase() {
        ClockPhase::Idle => "not started",
        ClockPhase::Running => "running",
        ClockPhase::Paused => "paused",
    };
    let half = if clock.is_second_half { "2nd half" } else { "1st half" };
    format!(
        "{}\n{} / {} ({phase}, {half})",
        state.score_text(),
        format_display_time(tracker.elapsed_seconds()),
        format_display_time(clock.regulation_duration),
    )
}

pub fn goal_line(goal: &Goal) -> String {
    let mut line = format!("{} GOAL {} - {}", goal.display_time, goal.team_name, goal.scorer_name);
    if let Some(number) = goal.scorer_shirt_number {
        let _ = write!(line, " #{number}");
    }
    if let Some(assist) = &goal.assist_name {
        let _ = write!(line, " (assist {assist}");
        if let Some(number) = goal.assist_shirt_number {
            let _ = write!(line, " #{number}");
        }
        line.push(')');
    }
    if goal.disallowed {
        let reason = goal.disallowed_reason.as_deref().unwrap_or("no reason given");
        let _ = write!(line, " [DISALLOWED: {reason}]");
    }
    line
}

pub fn event_line(event: &MatchEvent) -> String {
    let mut line = format!("{} {}", event.display_time, event.event_type);
    if let Some(team) = &event.team_name {
        let _ = write!(line, " - {team}");
    }
    if let Some(score) = &event.score {
        let _ = write!(line, " ({score})");
    }
    if !event.notes.is_empty() {
        let _ = write!(line, ": {}", event.notes);
    }
    line
}

pub fn timeline(items: &[TimelineItem]) -> String {
    if items.is_empty() {
        return "No goals or events recorded".to_string();
    }
    items
        .iter()
        .map(|item| match item {
            TimelineItem::Goal { index, goal } => format!("g{index:<3} {}", goal_line(goal)),
            TimelineItem::Event { index, event } => format!("e{index:<3} {}", event_line(event)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn statistics(report: &StatisticsReport) -> String {
    let s = &report.snapshot;
    let source = if report.from_cache { "cached" } else { "fresh" };
    format!(
        "Goals: {}\nCards: {}\nFouls: {}\nPenalties: {}\nIncidents: {}\nTotal events: {}\n({source}, key {})",
        s.goals, s.cards, s.fouls, s.penalties, s.incidents, s.total, s.cache_key
    )
}

pub fn momentum(state: &MatchState, momentum: &MomentumSnapshot) -> String {
    let leader = match momentum.leader() {
        Some(side) => state.team_name(side).to_string(),
        None => "level".to_string(),
    };
    format!(
        "{} {:.0}% | {:.0}% {} ({} to {}, {leader})\n{:+.1} / {:+.1}",
        state.team_name(TeamSide::Team1),
        momentum.team1_percentage(),
        momentum.team2_percentage(),
        state.team_name(TeamSide::Team2),
        format_display_time(momentum.window_start),
        format_display_time(momentum.window_end),
        momentum.team1_score,
        momentum.team2_score,
    )
}
