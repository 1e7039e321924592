use matchday_types::{ledger::TeamSide, Result};

use crate::validation::validation_error;

/// Names each side has used, oldest first. The last entry is the current
/// display name; re-using an older name moves it to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamIdentity {
    team1: Vec<String>,
    team2: Vec<String>,
}

impl TeamIdentity {
    pub fn new(team1: impl Into<String>, team2: impl Into<String>) -> Self {
        Self {
            team1: vec![team1.into()],
            team2: vec![team2.into()],
        }
    }

    /// Rebuilds from stored histories, falling back to the given defaults for
    /// an empty side. Blank and repeated names are dropped.
    pub fn from_histories(
        team1: &[String],
        team2: &[String],
        team1_default: &str,
        team2_default: &str,
    ) -> Self {
        Self {
            team1: normalized(team1, team1_default),
            team2: normalized(team2, team2_default),
        }
    }

    pub fn current(&self, side: TeamSide) -> &str {
        self.history(side)
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn history(&self, side: TeamSide) -> &[String] {
        match side {
            TeamSide::Team1 => &self.team1,
            TeamSide::Team2 => &self.team2,
        }
    }

    pub fn rename(&mut self, side: TeamSide, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(validation_error("team name must not be blank"));
        }
        if self.current(side.opponent()).eq_ignore_ascii_case(name) {
            return Err(validation_error(format!(
                "'{name}' is already the name of {}",
                side.opponent()
            )));
        }
        let history = match side {
            TeamSide::Team1 => &mut self.team1,
            TeamSide::Team2 => &mut self.team2,
        };
        history.retain(|existing| existing != name);
        history.push(name.to_string());
        Ok(())
    }

    /// Side whose current name appears in `label`, checking team 2 first.
    pub fn side_named_in(&self, label: &str) -> Option<TeamSide> {
        let label = label.to_lowercase();
        [TeamSide::Team2, TeamSide::Team1]
            .into_iter()
            .find(|side| label.contains(&self.current(*side).to_lowercase()))
    }
}

fn normalized(history: &[String], fallback: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(history.len());
    for name in history.iter().map(|name| name.trim()) {
        if name.is_empty() {
            continue;
        }
        names.retain(|existing| existing != name);
        names.push(name.to_string());
    }
    if names.is_empty() {
        names.push(fallback.to_string());
    }
    names
}
