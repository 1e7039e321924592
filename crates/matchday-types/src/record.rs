use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    clock::{MatchClock, DEFAULT_REGULATION_SECS},
    ledger::{Goal, MatchEvent},
};

/// Store key under which the match record is kept.
pub const MATCH_RECORD_KEY: &str = "matchRecord";

/// Persisted shape of a match session.
///
/// Every field is optional on load so older or partial records still
/// restore; absent values fall back to the defaults supplied by the caller.
/// Goals and events are decoded one by one and entries that no longer decode
/// are dropped with a warning instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    #[serde(default)]
    pub game_time: Option<u64>,
    #[serde(default)]
    pub is_second_half: bool,
    #[serde(default)]
    pub has_started: Option<bool>,
    #[serde(default, deserialize_with = "lenient_goals")]
    pub goals: Vec<Goal>,
    #[serde(default, deserialize_with = "lenient_events")]
    pub match_events: Vec<MatchEvent>,
    #[serde(default)]
    pub team1_history: Vec<String>,
    #[serde(default)]
    pub team2_history: Vec<String>,
    /// Roster data owned elsewhere; carried through untouched.
    #[serde(default)]
    pub attendance: Vec<Value>,
}

fn lenient_goals<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Goal>, D::Error> {
    Ok(decode_each(Option::deserialize(deserializer)?, "goal"))
}

fn lenient_events<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<MatchEvent>, D::Error> {
    Ok(decode_each(Option::deserialize(deserializer)?, "event"))
}

fn decode_each<T: DeserializeOwned>(raw: Option<Vec<Value>>, what: &str) -> Vec<T> {
    raw.unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Dropping unreadable stored {} #{}: {}", what, idx, err);
                None
            }
        })
        .collect()
}

impl MatchRecord {
    pub fn empty(game_time: u64) -> Self {
        Self {
            elapsed_time: 0,
            is_running: false,
            start_timestamp: None,
            game_time: Some(game_time),
            is_second_half: false,
            has_started: Some(false),
            goals: Vec::new(),
            match_events: Vec::new(),
            team1_history: Vec::new(),
            team2_history: Vec::new(),
            attendance: Vec::new(),
        }
    }

    /// Clock fields as stored. A running flag without an anchor (or the
    /// reverse) is repaired to a paused clock. `regulation` applies when the
    /// record carries no game time; records without a kick-off flag count as
    /// started once any clock field moved.
    pub fn clock(&self, regulation: u64) -> MatchClock {
        let anchor = if self.is_running {
            self.start_timestamp
        } else {
            None
        };
        let has_started = self
            .has_started
            .unwrap_or(anchor.is_some() || self.elapsed_time > 0 || self.is_second_half);
        MatchClock {
            elapsed_seconds: self.elapsed_time,
            is_running: anchor.is_some(),
            start_anchor: anchor,
            regulation_duration: self.game_time.unwrap_or(regulation),
            is_second_half: self.is_second_half,
            has_started: has_started || anchor.is_some(),
        }
    }
}

impl Default for MatchRecord {
    fn default() -> Self {
        Self::empty(DEFAULT_REGULATION_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_record_uses_defaults() {
        let json = serde_json::json!({ "elapsedTime": 95, "goals": [] });
        let record: MatchRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.elapsed_time, 95);
        assert_eq!(record.game_time, None);
        assert!(record.match_events.is_empty());

        let clock = record.clock(3600);
        assert_eq!(clock.regulation_duration, 3600);
        assert!(clock.has_started);
        assert_eq!(MatchRecord::empty(2400).clock(3600).regulation_duration, 2400);
    }

    #[test]
    fn running_flag_without_anchor_restores_paused() {
        let record = MatchRecord {
            is_running: true,
            start_timestamp: None,
            elapsed_time: 40,
            ..MatchRecord::default()
        };
        let clock = record.clock(DEFAULT_REGULATION_SECS);
        assert!(!clock.is_running);
        assert!(clock.is_consistent());
        assert_eq!(clock.elapsed_seconds, 40);
    }

    #[test]
    fn field_names_match_stored_shape() {
        let json = serde_json::to_value(MatchRecord::empty(3600)).unwrap();
        for key in [
            "elapsedTime",
            "isRunning",
            "startTimestamp",
            "gameTime",
            "isSecondHalf",
            "hasStarted",
            "goals",
            "matchEvents",
            "team1History",
            "team2History",
            "attendance",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn undecodable_entries_are_dropped_individually() {
        let json = serde_json::json!({
            "elapsedTime": 1500,
            "goals": [
                {
                    "rawTime": 600,
                    "displayTime": "10:00",
                    "scorerName": "A",
                    "team": 1,
                    "teamName": "Home"
                },
                { "rawTime": 700, "displayTime": "11:40", "scorerName": "B", "team": 3, "teamName": "X" }
            ],
            "matchEvents": [
                { "rawTime": 30, "displayTime": "00:30", "type": "Foul" },
                { "rawTime": -4, "displayTime": "00:00", "type": "Foul" },
                { "rawTime": 40, "displayTime": "00:40", "type": "Dive" }
            ]
        });
        let record: MatchRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.elapsed_time, 1500);
        assert_eq!(record.goals.len(), 1);
        assert_eq!(record.goals[0].scorer_name, "A");
        assert_eq!(record.match_events.len(), 1);

        let nulls = serde_json::json!({ "goals": null, "matchEvents": null });
        let record: MatchRecord = serde_json::from_value(nulls).unwrap();
        assert!(record.goals.is_empty());
    }
}
