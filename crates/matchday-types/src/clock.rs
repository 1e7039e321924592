use serde::{Deserialize, Serialize};

/// Regulation match length used when configuration does not supply one.
pub const DEFAULT_REGULATION_SECS: u64 = 4200;

/// Stored clock fields of a match.
///
/// `start_anchor` is the wall-clock millisecond at which the clock would have
/// read zero; it is present exactly while the clock runs. Elapsed time while
/// running is derived from it, never accumulated. `has_started` is set by
/// the first start and only cleared by a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchClock {
    pub elapsed_seconds: u64,
    pub is_running: bool,
    pub start_anchor: Option<i64>,
    pub regulation_duration: u64,
    pub is_second_half: bool,
    #[serde(default)]
    pub has_started: bool,
}

/// Observable clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockPhase {
    Idle,
    Running,
    Paused,
}

impl MatchClock {
    pub fn new(regulation_duration: u64) -> Self {
        Self {
            elapsed_seconds: 0,
            is_running: false,
            start_anchor: None,
            regulation_duration,
            is_second_half: false,
            has_started: false,
        }
    }

    pub fn phase(&self) -> ClockPhase {
        if self.is_running {
            ClockPhase::Running
        } else if self.has_started {
            ClockPhase::Paused
        } else {
            ClockPhase::Idle
        }
    }

    /// Checks the anchor/running pairing.
    pub fn is_consistent(&self) -> bool {
        self.is_running == self.start_anchor.is_some()
    }
}

impl Default for MatchClock {
    fn default() -> Self {
        Self::new(DEFAULT_REGULATION_SECS)
    }
}

/// Formats whole seconds as `MM:SS`. Minutes are not wrapped at the hour.
pub fn format_display_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Parses `MM:SS` back into seconds.
pub fn parse_display_time(text: &str) -> Option<u64> {
    let (minutes, seconds) = text.split_once(':')?;
    if minutes.is_empty() || seconds.len() != 2 {
        return None;
    }
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    Some(minutes * 60 + seconds)
}
