//! Live match tracker owning the match aggregate.
//!
//! Every mutation runs to completion on `&mut self`, then invalidates the
//! statistics cache, publishes a ledger notice and queues a persistence
//! snapshot. Clock transitions and phase markers are saved immediately.

use std::{sync::Arc, time::Duration};

use matchday_clock::{ClockEngine, ClockTicker, PhaseMarker, TimeSource};
use matchday_feed::UpdateFeed;
use matchday_ledger::MatchState;
use matchday_stats::{MomentumEngine, StatisticsCache};
use matchday_store::{load_decoded, store_error, KeyValueStore, PersistenceWriter, Stored};
use matchday_types::{
    clock::MatchClock,
    config::MatchdayConfig,
    events::{
        ClockNotice, LedgerNotice, LifecyclePhase, NoticeKind, NoticePayload, TimelineItem,
        TrackerNotice,
    },
    ledger::{EventPatch, EventType, Goal, GoalPatch, MatchEvent, TeamSide},
    record::MatchRecord,
    stats::{MomentumSnapshot, Scoreline, StatisticsReport},
    MatchdayError, Result,
};
use tokio::sync::watch;
use tracing::{info, warn};

/// A goal as entered by a user. Time defaults to the current clock reading.
#[derive(Debug, Clone)]
pub struct GoalEntry {
    pub team: TeamSide,
    pub scorer_name: String,
    pub scorer_shirt_number: Option<u8>,
    pub assist_name: Option<String>,
    pub assist_shirt_number: Option<u8>,
    pub raw_time: Option<u32>,
}

impl GoalEntry {
    pub fn new(team: TeamSide, scorer_name: impl Into<String>) -> Self {
        Self {
            team,
            scorer_name: scorer_name.into(),
            scorer_shirt_number: None,
            assist_name: None,
            assist_shirt_number: None,
            raw_time: None,
        }
    }

    pub fn at(mut self, raw_time: u32) -> Self {
        self.raw_time = Some(raw_time);
        self
    }
}

/// A manual event as entered by a user.
#[derive(Debug, Clone)]
pub struct EventEntry {
    pub event_type: EventType,
    pub team: Option<TeamSide>,
    pub notes: String,
    pub raw_time: Option<u32>,
}

impl EventEntry {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            team: None,
            notes: String::new(),
            raw_time: None,
        }
    }

    pub fn for_team(mut self, team: TeamSide) -> Self {
        self.team = Some(team);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn at(mut self, raw_time: u32) -> Self {
        self.raw_time = Some(raw_time);
        self
    }
}

pub struct MatchTracker {
    config: MatchdayConfig,
    engine: ClockEngine,
    state: MatchState,
    stats: StatisticsCache,
    momentum: MomentumEngine,
    feed: Arc<dyn UpdateFeed>,
    writer: PersistenceWriter,
    ticker: Option<ClockTicker>,
}

impl MatchTracker {
    /// Rebuilds the tracker from the stored record, or starts a fresh match
    /// when nothing is stored. A clock that was running keeps running. A
    /// record that cannot be decoded at all is preserved under a backup key
    /// and reported on the feed before a fresh match replaces it.
    pub async fn restore(
        config: MatchdayConfig,
        store: Arc<dyn KeyValueStore>,
        time: Arc<dyn TimeSource>,
        feed: Arc<dyn UpdateFeed>,
    ) -> Result<Self> {
        config.validate()?;
        let regulation = config.clock.regulation_duration_secs;
        let key = config.persistence.record_key.clone();
        let mut unreadable = None;
        let record = match load_decoded::<MatchRecord>(store.as_ref(), &key).await? {
            Stored::Decoded(record) => record,
            Stored::Missing => MatchRecord::empty(regulation),
            Stored::Unreadable { backup_key, error } => {
                warn!(
                    "Match record unreadable, starting fresh (kept as '{}'): {}",
                    backup_key, error
                );
                unreadable = Some(format!(
                    "stored match record is unreadable and was kept as '{backup_key}': {error}"
                ));
                MatchRecord::empty(regulation)
            }
        };
        let state = MatchState::from_record(record, config.ledger.clone(), regulation);
        let writer = PersistenceWriter::spawn(
            store,
            Duration::from_millis(config.persistence.debounce_ms),
            Arc::clone(&feed),
        );

        let mut tracker = Self {
            engine: ClockEngine::new(Arc::clone(&time)),
            stats: StatisticsCache::new(&config.stats, time),
            momentum: MomentumEngine::new(&config.momentum),
            config,
            state,
            feed,
            writer,
            ticker: None,
        };
        if let Some(anchor) = tracker.state.clock().start_anchor {
            tracker.start_ticker(anchor);
        }
        info!(
            "Tracker restored: {} goal(s), {} event(s), clock at {}s",
            tracker.state.goals().len(),
            tracker.state.events().len(),
            tracker.elapsed_seconds()
        );
        tracker.publish(TrackerNotice::lifecycle(LifecyclePhase::Restored, None));
        if let Some(message) = unreadable {
            tracker.publish(TrackerNotice::persistence_failed(key, message));
        }
        Ok(tracker)
    }

    pub fn config(&self) -> &MatchdayConfig {
        &self.config
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Wholesale reset to an idle clock and empty ledger.
    pub fn new_match(&mut self) {
        self.stop_ticker();
        self.state.reset(self.config.clock.regulation_duration_secs);
        self.stats.invalidate();
        info!("New match started");
        self.publish(TrackerNotice::lifecycle(LifecyclePhase::NewMatch, None));
        self.after_ledger_change(true);
    }

    pub fn clock(&self) -> MatchClock {
        *self.state.clock()
    }

    /// Authoritative elapsed seconds, derived from the anchor while running.
    pub fn elapsed_seconds(&self) -> u64 {
        self.engine.tick(self.state.clock())
    }

    /// Periodic refresh channel while the clock runs.
    pub fn ticks(&self) -> Option<watch::Receiver<u64>> {
        self.ticker.as_ref().map(ClockTicker::subscribe)
    }

    pub fn start_clock(&mut self) -> Result<u64> {
        let anchor = self.engine.start(self.state.clock_mut())?;
        self.start_ticker(anchor);
        self.after_clock_change();
        Ok(self.elapsed_seconds())
    }

    pub fn pause_clock(&mut self) -> Result<u64> {
        let elapsed = self.engine.pause(self.state.clock_mut())?;
        self.stop_ticker();
        self.after_clock_change();
        Ok(elapsed)
    }

    pub fn set_regulation_duration(&mut self, seconds: i64) -> u64 {
        let applied = self
            .engine
            .set_regulation_duration(self.state.clock_mut(), seconds);
        self.after_clock_change();
        applied
    }

    /// Marks half time and appends the half-time system event. Returns the
    /// event's index.
    pub fn mark_half_time(&mut self) -> Result<usize> {
        let mut clock = *self.state.clock();
        let marker = self.engine.mark_half_boundary(&mut clock)?;
        self.commit_phase_marker(clock, marker, LifecyclePhase::HalfTime)
    }

    /// Marks full time and appends the full-time system event.
    pub fn mark_full_time(&mut self) -> Result<usize> {
        if self.state.has_event_of_type(EventType::FullTime) {
            return Err(MatchdayError::Invariant(
                "full time has already been marked".into(),
            ));
        }
        let mut clock = *self.state.clock();
        let marker = self.engine.mark_full_time(&mut clock)?;
        self.commit_phase_marker(clock, marker, LifecyclePhase::FullTime)
    }

    pub fn record_goal(&mut self, entry: GoalEntry) -> Result<usize> {
        let raw_time = self.entry_time(entry.raw_time)?;
        let team_name = self.state.team_name(entry.team).to_string();
        let mut goal = Goal::new(raw_time, entry.scorer_name.trim(), entry.team, team_name);
        goal.scorer_shirt_number = entry.scorer_shirt_number;
        goal.assist_name = entry
            .assist_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        goal.assist_shirt_number = entry.assist_shirt_number;
        self.add_goal(goal)
    }

    pub fn add_goal(&mut self, goal: Goal) -> Result<usize> {
        let index = self.state.add_goal(goal)?;
        self.after_ledger_change(false);
        Ok(index)
    }

    pub fn record_event(&mut self, entry: EventEntry) -> Result<usize> {
        let raw_time = self.entry_time(entry.raw_time)?;
        let mut event = MatchEvent::new(raw_time, entry.event_type).with_notes(entry.notes);
        if let Some(side) = entry.team {
            event = event.with_team(side, self.state.team_name(side));
        }
        self.add_event(event)
    }

    /// Adds a manually entered event. Phase markers only come from
    /// [`mark_half_time`](Self::mark_half_time) and
    /// [`mark_full_time`](Self::mark_full_time).
    pub fn add_event(&mut self, event: MatchEvent) -> Result<usize> {
        if event.is_system_event || event.event_type.is_phase_marker() {
            warn!("Rejected manual {} event", event.event_type);
            return Err(MatchdayError::Validation(format!(
                "'{}' events are recorded by the match clock",
                event.event_type
            )));
        }
        let index = self.state.add_event(event)?;
        self.after_ledger_change(false);
        Ok(index)
    }

    pub fn update_goal(&mut self, index: usize, patch: &GoalPatch) -> Result<Goal> {
        let goal = self.state.update_goal(index, patch)?.clone();
        self.after_ledger_change(false);
        Ok(goal)
    }

    pub fn update_event(&mut self, index: usize, patch: &EventPatch) -> Result<MatchEvent> {
        let event = self.state.update_event(index, patch)?.clone();
        self.after_ledger_change(false);
        Ok(event)
    }

    pub fn remove_goal(&mut self, index: usize) -> Result<Goal> {
        let goal = self.state.remove_goal(index)?;
        self.after_ledger_change(false);
        Ok(goal)
    }

    pub fn remove_event(&mut self, index: usize) -> Result<MatchEvent> {
        let event = self.state.remove_event(index)?;
        self.after_ledger_change(false);
        Ok(event)
    }

    pub fn toggle_goal_disallowed(&mut self, index: usize, reason: Option<&str>) -> Result<Goal> {
        let goal = self.state.toggle_goal_disallowed(index, reason)?.clone();
        self.after_ledger_change(false);
        Ok(goal)
    }

    pub fn rename_team(&mut self, side: TeamSide, name: &str) -> Result<()> {
        self.state.rename_team(side, name)?;
        self.after_ledger_change(false);
        Ok(())
    }

    pub fn timeline(&self) -> Vec<TimelineItem> {
        self.state.ordered_timeline()
    }

    pub fn statistics(&mut self, force_recompute: bool) -> StatisticsReport {
        self.stats.get_statistics(&self.state, force_recompute)
    }

    pub fn momentum(&self) -> MomentumSnapshot {
        self.momentum.compute(&self.state, self.elapsed_seconds())
    }

    pub fn momentum_with_window(&self, window_seconds: u64) -> MomentumSnapshot {
        self.momentum
            .compute_with_window(&self.state, self.elapsed_seconds(), window_seconds)
    }

    pub fn score(&self) -> Scoreline {
        self.state.score()
    }

    /// Writes any queued snapshot and reports persistence failures since the
    /// last flush.
    pub async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    /// Stops the ticker, flushes everything, then closes the feed.
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop_ticker();
        self.publish(TrackerNotice::lifecycle(LifecyclePhase::Shutdown, None));
        info!("Tracker shutting down");
        let flushed = self.writer.shutdown().await;
        self.feed.close();
        flushed
    }

    fn entry_time(&self, requested: Option<u32>) -> Result<u32> {
        match requested {
            Some(raw_time) => Ok(raw_time),
            None => u32::try_from(self.elapsed_seconds()).map_err(|_| {
                MatchdayError::Validation("clock reading is out of range for an entry".into())
            }),
        }
    }

    /// Appends the marker's system event first so a rejected event leaves
    /// the clock untouched, then commits the new clock.
    fn commit_phase_marker(
        &mut self,
        clock: MatchClock,
        marker: PhaseMarker,
        phase: LifecyclePhase,
    ) -> Result<usize> {
        let cap = u64::from(self.config.ledger.max_raw_time_secs);
        let raw_time = u32::try_from(marker.elapsed_seconds.min(cap)).unwrap_or(u32::MAX);
        let score = self.state.score_text();
        let event = MatchEvent::system(raw_time, marker.kind, score.clone());
        let index = self.state.add_event(event)?;
        *self.state.clock_mut() = clock;
        self.stop_ticker();
        self.publish(TrackerNotice::lifecycle(phase, Some(score)));
        self.publish_clock();
        self.after_ledger_change(true);
        Ok(index)
    }

    fn start_ticker(&mut self, anchor: i64) {
        self.stop_ticker();
        self.ticker = Some(ClockTicker::spawn(
            self.engine.time_source(),
            anchor,
            Duration::from_millis(self.config.clock.refresh_interval_ms),
        ));
    }

    fn stop_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    fn after_clock_change(&mut self) {
        self.publish_clock();
        self.persist(true);
    }

    fn after_ledger_change(&mut self, critical: bool) {
        self.stats.invalidate();
        let statistics = self.stats.get_statistics(&self.state, false).snapshot;
        let notice = LedgerNotice {
            timeline: self.state.ordered_timeline(),
            statistics,
            momentum: self.momentum(),
            score: self.state.score(),
        };
        self.publish(TrackerNotice::new(
            NoticeKind::Ledger,
            NoticePayload::Ledger(notice),
        ));
        self.persist(critical);
    }

    fn publish_clock(&self) {
        let notice = ClockNotice {
            clock: *self.state.clock(),
            elapsed_seconds: self.elapsed_seconds(),
        };
        self.publish(TrackerNotice::new(
            NoticeKind::Clock,
            NoticePayload::Clock(notice),
        ));
    }

    fn publish(&self, notice: TrackerNotice) {
        if let Err(err) = self.feed.publish(notice) {
            warn!("Failed to publish tracker notice: {}", err);
        }
    }

    /// Queues a snapshot. Failures are reported, never rolled back.
    fn persist(&self, critical: bool) {
        let key = self.config.persistence.record_key.as_str();
        let queued = serde_json::to_value(self.state.to_record())
            .map_err(|err| store_error(format!("failed to encode match record: {err}")))
            .and_then(|value| {
                if critical {
                    self.writer.save_now(key, value)
                } else {
                    self.writer.save(key, value)
                }
            });
        if let Err(err) = queued {
            warn!("Match record not queued for saving: {}", err);
            self.publish(TrackerNotice::persistence_failed(key, err.to_string()));
        }
    }
}
