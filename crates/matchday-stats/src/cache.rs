use std::{fmt::Write, sync::Arc};

use chrono::{DateTime, Utc};
use matchday_clock::TimeSource;
use matchday_ledger::MatchState;
use matchday_types::{
    config::StatsConfig,
    ledger::EventCategory,
    stats::{StatisticsReport, StatisticsSnapshot},
};
use tracing::debug;

/// Fingerprint of everything the statistics depend on: goal and event
/// counts plus a hash over each goal's time and disallowed flag and each
/// event's time and type.
pub fn compute_cache_key(state: &MatchState) -> String {
    let mut material = String::new();
    for goal in state.goals() {
        let flag = if goal.disallowed { 'd' } else { 'a' };
        let _ = write!(material, "{}{}|", goal.raw_time, flag);
    }
    for event in state.events() {
        let _ = write!(material, "{}{}|", event.raw_time, event.event_type.label());
    }
    format!(
        "{}-{}-{:016x}",
        state.goals().len(),
        state.events().len(),
        fxhash::hash64(material.as_str())
    )
}

/// Counts straight from the ledger, without touching any cache.
pub fn compute_statistics(state: &MatchState, computed_at: DateTime<Utc>) -> StatisticsSnapshot {
    let mut snapshot = StatisticsSnapshot {
        goals: state.goals().iter().filter(|goal| goal.counts()).count() as u32,
        cards: 0,
        fouls: 0,
        penalties: 0,
        incidents: 0,
        total: (state.goals().len() + state.events().len()) as u32,
        cache_key: compute_cache_key(state),
        computed_at,
    };
    for event in state.events() {
        match event.event_type.category() {
            EventCategory::Card => snapshot.cards += 1,
            EventCategory::Foul => snapshot.fouls += 1,
            EventCategory::Penalty => snapshot.penalties += 1,
            EventCategory::Incident => snapshot.incidents += 1,
            EventCategory::Restart | EventCategory::Phase | EventCategory::Other => {}
        }
    }
    snapshot
}

/// Memoized statistics, keyed by ledger content and bounded by age.
pub struct StatisticsCache {
    time: Arc<dyn TimeSource>,
    max_age_ms: i64,
    cached: Option<StatisticsSnapshot>,
}

impl StatisticsCache {
    pub fn new(config: &StatsConfig, time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            max_age_ms: i64::try_from(config.cache_max_age_ms).unwrap_or(i64::MAX),
            cached: None,
        }
    }

    pub fn get_statistics(&mut self, state: &MatchState, force_recompute: bool) -> StatisticsReport {
        let now_ms = self.time.now_ms();
        if !force_recompute {
            if let Some(snapshot) = self.cached.as_ref() {
                let age_ms = now_ms - snapshot.computed_at.timestamp_millis();
                if age_ms < self.max_age_ms && snapshot.cache_key == compute_cache_key(state) {
                    return StatisticsReport {
                        snapshot: snapshot.clone(),
                        from_cache: true,
                    };
                }
            }
        }

        let computed_at = DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now);
        let snapshot = compute_statistics(state, computed_at);
        debug!("Statistics recomputed (key {})", snapshot.cache_key);
        self.cached = Some(snapshot.clone());
        StatisticsReport {
            snapshot,
            from_cache: false,
        }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_warm(&self) -> bool {
        self.cached.is_some()
    }
}
