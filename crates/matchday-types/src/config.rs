use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    clock::DEFAULT_REGULATION_SECS,
    ledger::{MAX_NOTES_LEN, MAX_RAW_TIME_SECS},
    record::MATCH_RECORD_KEY,
    MatchdayError, Result,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub regulation_duration_secs: u64,
    pub refresh_interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            regulation_duration_secs: DEFAULT_REGULATION_SECS,
            refresh_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub max_raw_time_secs: u32,
    pub max_notes_len: usize,
    pub team1_default_name: String,
    pub team2_default_name: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_raw_time_secs: MAX_RAW_TIME_SECS,
            max_notes_len: MAX_NOTES_LEN,
            team1_default_name: "Home".into(),
            team2_default_name: "Away".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub cache_max_age_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            cache_max_age_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub window_secs: u64,
    pub goal_weight: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            goal_weight: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub data_dir: String,
    pub record_key: String,
    pub debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: "matchday-data".into(),
            record_key: MATCH_RECORD_KEY.into(),
            debounce_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchdayConfig {
    pub clock: ClockConfig,
    pub ledger: LedgerConfig,
    pub stats: StatsConfig,
    pub momentum: MomentumConfig,
    pub persistence: PersistenceConfig,
    pub ops: OpsConfig,
}

impl MatchdayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            MatchdayError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            MatchdayError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.clock.refresh_interval_ms == 0 {
            return Err(MatchdayError::Configuration(
                "clock.refresh_interval_ms must be greater than zero".into(),
            ));
        }
        if self.clock.regulation_duration_secs > u64::from(self.ledger.max_raw_time_secs) {
            return Err(MatchdayError::Configuration(format!(
                "clock.regulation_duration_secs must not exceed ledger.max_raw_time_secs ({})",
                self.ledger.max_raw_time_secs
            )));
        }
        if self.ledger.team1_default_name.trim().is_empty()
            || self.ledger.team2_default_name.trim().is_empty()
        {
            return Err(MatchdayError::Configuration(
                "ledger team default names must not be empty".into(),
            ));
        }
        if self.momentum.window_secs == 0 {
            return Err(MatchdayError::Configuration(
                "momentum.window_secs must be greater than zero".into(),
            ));
        }
        if !self.momentum.goal_weight.is_finite() || self.momentum.goal_weight <= 0.0 {
            return Err(MatchdayError::Configuration(
                "momentum.goal_weight must be a positive number".into(),
            ));
        }
        if self.persistence.record_key.trim().is_empty() {
            return Err(MatchdayError::Configuration(
                "persistence.record_key must not be empty".into(),
            ));
        }
        Ok(())
    }
}
