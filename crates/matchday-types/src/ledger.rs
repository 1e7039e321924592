use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{clock::format_display_time, MatchdayError};

/// Latest raw time accepted for a ledger entry (two hours of play).
pub const MAX_RAW_TIME_SECS: u32 = 7200;
/// Longest accepted free-text note on an event.
pub const MAX_NOTES_LEN: usize = 500;

/// The two sides of a match. Stored on the wire as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TeamSide {
    Team1,
    Team2,
}

impl TeamSide {
    pub fn opponent(self) -> Self {
        match self {
            TeamSide::Team1 => TeamSide::Team2,
            TeamSide::Team2 => TeamSide::Team1,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            TeamSide::Team1 => 1,
            TeamSide::Team2 => 2,
        }
    }
}

impl TryFrom<u8> for TeamSide {
    type Error = MatchdayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TeamSide::Team1),
            2 => Ok(TeamSide::Team2),
            other => Err(MatchdayError::Validation(format!(
                "team must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<TeamSide> for u8 {
    fn from(side: TeamSide) -> Self {
        side.number()
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.number())
    }
}

/// Statistic bucket an event type counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Card,
    Foul,
    Penalty,
    Incident,
    Restart,
    Phase,
    Other,
}

/// Kinds of discrete match events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Yellow Card")]
    YellowCard,
    #[serde(rename = "Red Card")]
    RedCard,
    #[serde(rename = "Sin Bin")]
    SinBin,
    #[serde(rename = "Foul")]
    Foul,
    #[serde(rename = "Penalty")]
    Penalty,
    #[serde(rename = "Penalty Miss")]
    PenaltyMiss,
    #[serde(rename = "Offside")]
    Offside,
    #[serde(rename = "Free Kick")]
    FreeKick,
    #[serde(rename = "Corner")]
    Corner,
    #[serde(rename = "Throw In")]
    ThrowIn,
    #[serde(rename = "Goal Kick")]
    GoalKick,
    #[serde(rename = "Substitution")]
    Substitution,
    #[serde(rename = "Injury")]
    Injury,
    #[serde(rename = "Incident")]
    Incident,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "Half Time")]
    HalfTime,
    #[serde(rename = "Full Time")]
    FullTime,
}

impl EventType {
    pub const ALL: [EventType; 17] = [
        EventType::YellowCard,
        EventType::RedCard,
        EventType::SinBin,
        EventType::Foul,
        EventType::Penalty,
        EventType::PenaltyMiss,
        EventType::Offside,
        EventType::FreeKick,
        EventType::Corner,
        EventType::ThrowIn,
        EventType::GoalKick,
        EventType::Substitution,
        EventType::Injury,
        EventType::Incident,
        EventType::Other,
        EventType::HalfTime,
        EventType::FullTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventType::YellowCard => "Yellow Card",
            EventType::RedCard => "Red Card",
            EventType::SinBin => "Sin Bin",
            EventType::Foul => "Foul",
            EventType::Penalty => "Penalty",
            EventType::PenaltyMiss => "Penalty Miss",
            EventType::Offside => "Offside",
            EventType::FreeKick => "Free Kick",
            EventType::Corner => "Corner",
            EventType::ThrowIn => "Throw In",
            EventType::GoalKick => "Goal Kick",
            EventType::Substitution => "Substitution",
            EventType::Injury => "Injury",
            EventType::Incident => "Incident",
            EventType::Other => "Other",
            EventType::HalfTime => "Half Time",
            EventType::FullTime => "Full Time",
        }
    }

    pub fn category(self) -> EventCategory {
        match self {
            EventType::YellowCard | EventType::RedCard | EventType::SinBin => EventCategory::Card,
            EventType::Foul => EventCategory::Foul,
            EventType::Penalty | EventType::PenaltyMiss => EventCategory::Penalty,
            EventType::Injury | EventType::Incident => EventCategory::Incident,
            EventType::FreeKick
            | EventType::Corner
            | EventType::ThrowIn
            | EventType::GoalKick
            | EventType::Offside => EventCategory::Restart,
            EventType::HalfTime | EventType::FullTime => EventCategory::Phase,
            EventType::Substitution | EventType::Other => EventCategory::Other,
        }
    }

    /// Phase markers are only ever written by clock transitions.
    pub fn is_phase_marker(self) -> bool {
        self.category() == EventCategory::Phase
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventType {
    type Err = MatchdayError;

    /// Accepts the display label in any case, with spaces, dashes or
    /// underscores between words.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        EventType::ALL
            .into_iter()
            .find(|kind| normalize_label(kind.label()) == wanted)
            .ok_or_else(|| MatchdayError::Validation(format!("unknown event type '{s}'")))
    }
}

fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A goal recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub raw_time: u32,
    pub display_time: String,
    pub scorer_name: String,
    #[serde(default)]
    pub scorer_shirt_number: Option<u8>,
    #[serde(default)]
    pub assist_name: Option<String>,
    #[serde(default)]
    pub assist_shirt_number: Option<u8>,
    pub team: TeamSide,
    pub team_name: String,
    #[serde(default)]
    pub disallowed: bool,
    #[serde(default)]
    pub disallowed_reason: Option<String>,
}

impl Goal {
    pub fn new(
        raw_time: u32,
        scorer_name: impl Into<String>,
        team: TeamSide,
        team_name: impl Into<String>,
    ) -> Self {
        Self {
            raw_time,
            display_time: format_display_time(raw_time.into()),
            scorer_name: scorer_name.into(),
            scorer_shirt_number: None,
            assist_name: None,
            assist_shirt_number: None,
            team,
            team_name: team_name.into(),
            disallowed: false,
            disallowed_reason: None,
        }
    }

    pub fn with_scorer_number(mut self, number: u8) -> Self {
        self.scorer_shirt_number = Some(number);
        self
    }

    pub fn with_assist(mut self, name: impl Into<String>, number: Option<u8>) -> Self {
        self.assist_name = Some(name.into());
        self.assist_shirt_number = number;
        self
    }

    pub fn counts(&self) -> bool {
        !self.disallowed
    }
}

/// A discrete, non-goal entry in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub raw_time: u32,
    pub display_time: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub team: Option<TeamSide>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub is_system_event: bool,
    #[serde(default)]
    pub score: Option<String>,
}

impl MatchEvent {
    /// A manually recorded event.
    pub fn new(raw_time: u32, event_type: EventType) -> Self {
        Self {
            raw_time,
            display_time: format_display_time(raw_time.into()),
            event_type,
            notes: String::new(),
            team: None,
            team_name: None,
            is_system_event: false,
            score: None,
        }
    }

    /// A phase marker carrying the score at the moment it was taken.
    pub fn system(raw_time: u32, event_type: EventType, score: impl Into<String>) -> Self {
        Self {
            is_system_event: true,
            score: Some(score.into()),
            ..Self::new(raw_time, event_type)
        }
    }

    pub fn with_team(mut self, side: TeamSide, name: impl Into<String>) -> Self {
        self.team = Some(side);
        self.team_name = Some(name.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Free text used to attribute events that carry no side: the stored
    /// team name and the notes. The type label is left out so a team named
    /// like part of a label never captures every event of that type.
    pub fn attribution_text(&self) -> String {
        match &self.team_name {
            Some(name) => format!("{} {}", name, self.notes),
            None => self.notes.clone(),
        }
    }
}

/// Partial update for a goal. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalPatch {
    pub raw_time: Option<u32>,
    pub scorer_name: Option<String>,
    pub scorer_shirt_number: Option<Option<u8>>,
    pub assist_name: Option<Option<String>>,
    pub assist_shirt_number: Option<Option<u8>>,
    pub team: Option<TeamSide>,
    pub team_name: Option<String>,
}

impl GoalPatch {
    pub fn is_empty(&self) -> bool {
        *self == GoalPatch::default()
    }

    pub fn apply_to(&self, goal: &mut Goal) {
        if let Some(raw_time) = self.raw_time {
            goal.raw_time = raw_time;
            goal.display_time = format_display_time(raw_time.into());
        }
        if let Some(name) = &self.scorer_name {
            goal.scorer_name = name.clone();
        }
        if let Some(number) = self.scorer_shirt_number {
            goal.scorer_shirt_number = number;
        }
        if let Some(assist) = &self.assist_name {
            goal.assist_name = assist.clone();
        }
        if let Some(number) = self.assist_shirt_number {
            goal.assist_shirt_number = number;
        }
        if let Some(team) = self.team {
            goal.team = team;
        }
        if let Some(name) = &self.team_name {
            goal.team_name = name.clone();
        }
    }
}

/// Partial update for a manually recorded event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub raw_time: Option<u32>,
    pub event_type: Option<EventType>,
    pub notes: Option<String>,
    pub team: Option<Option<TeamSide>>,
    pub team_name: Option<Option<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }

    pub fn apply_to(&self, event: &mut MatchEvent) {
        if let Some(raw_time) = self.raw_time {
            event.raw_time = raw_time;
            event.display_time = format_display_time(raw_time.into());
        }
        if let Some(kind) = self.event_type {
            event.event_type = kind;
        }
        if let Some(notes) = &self.notes {
            event.notes = notes.clone();
        }
        if let Some(team) = self.team {
            event.team = team;
        }
        if let Some(name) = &self.team_name {
            event.team_name = name.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_type_has_a_category_and_parses_from_its_label() {
        for kind in EventType::ALL {
            let _ = kind.category();
            assert_eq!(kind.label().parse::<EventType>().unwrap(), kind);
        }
        assert_eq!("yellow_card".parse::<EventType>().unwrap(), EventType::YellowCard);
        assert_eq!("HALF-TIME".parse::<EventType>().unwrap(), EventType::HalfTime);
        assert!("card".parse::<EventType>().is_err());
    }

    #[test]
    fn only_half_and_full_time_are_phase_markers() {
        let markers: Vec<_> = EventType::ALL
            .into_iter()
            .filter(|kind| kind.is_phase_marker())
            .collect();
        assert_eq!(markers, vec![EventType::HalfTime, EventType::FullTime]);
    }

    #[test]
    fn goal_serializes_with_camel_case_and_numeric_team() {
        let goal = Goal::new(600, "A", TeamSide::Team1, "Home").with_scorer_number(9);
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["rawTime"], 600);
        assert_eq!(json["displayTime"], "10:00");
        assert_eq!(json["team"], 1);
        assert_eq!(json["scorerShirtNumber"], 9);

        let bad = serde_json::json!({
            "rawTime": 1, "displayTime": "00:01", "scorerName": "A",
            "team": 3, "teamName": "Home"
        });
        assert!(serde_json::from_value::<Goal>(bad).is_err());
    }

    #[test]
    fn event_type_uses_label_on_the_wire() {
        let event = MatchEvent::system(2100, EventType::HalfTime, "Home 1 - 0 Away");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Half Time");
        assert_eq!(json["isSystemEvent"], true);
        let back: MatchEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn patch_rederives_display_time() {
        let mut goal = Goal::new(10, "A", TeamSide::Team1, "Home");
        let patch = GoalPatch {
            raw_time: Some(125),
            assist_name: Some(Some("B".into())),
            ..Default::default()
        };
        patch.apply_to(&mut goal);
        assert_eq!(goal.display_time, "02:05");
        assert_eq!(goal.assist_name.as_deref(), Some("B"));
        assert!(GoalPatch::default().is_empty());
    }
}
