//! Match clock engine.
//!
//! Elapsed time is always derived from a stored wall-clock anchor, so a
//! process that was suspended resumes with the correct reading and no
//! periodic update is ever load-bearing.

mod ticker;

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::Utc;
use matchday_types::{
    clock::{ClockPhase, MatchClock},
    ledger::EventType,
    MatchdayError, Result,
};
use tracing::{debug, info};

pub use ticker::ClockTicker;

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicI64,
}

impl ManualTimeSource {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.advance_ms(seconds * 1000);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Whole seconds between an anchor and `now_ms`, rounded half up.
/// A wall clock that moved behind the anchor reads as zero.
pub fn elapsed_since(anchor_ms: i64, now_ms: i64) -> u64 {
    let delta = now_ms.saturating_sub(anchor_ms).max(0) as u64;
    (delta + 500) / 1000
}

/// Signal produced by a phase transition. The caller turns it into a system
/// event on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMarker {
    pub kind: EventType,
    pub elapsed_seconds: u64,
}

/// Applies clock transitions to a [`MatchClock`].
#[derive(Clone)]
pub struct ClockEngine {
    time: Arc<dyn TimeSource>,
}

impl ClockEngine {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self { time }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemTimeSource))
    }

    pub fn time_source(&self) -> Arc<dyn TimeSource> {
        Arc::clone(&self.time)
    }

    pub fn now_ms(&self) -> i64 {
        self.time.now_ms()
    }

    /// Idle|Paused → Running. Returns the new anchor.
    pub fn start(&self, clock: &mut MatchClock) -> Result<i64> {
        if clock.is_running {
            return Err(clock_error("clock is already running"));
        }
        let offset_ms = i64::try_from(clock.elapsed_seconds.saturating_mul(1000))
            .map_err(|_| clock_error("elapsed time overflows the anchor"))?;
        let anchor = self.now_ms().saturating_sub(offset_ms);
        clock.start_anchor = Some(anchor);
        clock.is_running = true;
        clock.has_started = true;
        info!(
            "Clock started at {}s (anchor {})",
            clock.elapsed_seconds, anchor
        );
        Ok(anchor)
    }

    /// Running → Paused. Returns the frozen elapsed seconds.
    pub fn pause(&self, clock: &mut MatchClock) -> Result<u64> {
        if !clock.is_running {
            return Err(clock_error("clock is not running"));
        }
        self.freeze(clock);
        info!("Clock paused at {}s", clock.elapsed_seconds);
        Ok(clock.elapsed_seconds)
    }

    /// Current elapsed seconds. Never mutates the clock.
    pub fn tick(&self, clock: &MatchClock) -> u64 {
        match (clock.is_running, clock.start_anchor) {
            (true, Some(anchor)) => elapsed_since(anchor, self.now_ms()),
            _ => clock.elapsed_seconds,
        }
    }

    /// Sets the regulation length, clamping negatives to zero.
    pub fn set_regulation_duration(&self, clock: &mut MatchClock, seconds: i64) -> u64 {
        let clamped = seconds.max(0) as u64;
        clock.regulation_duration = clamped;
        debug!("Regulation duration set to {}s", clamped);
        clamped
    }

    /// Jumps to the half-way point of regulation and stops the clock.
    pub fn mark_half_boundary(&self, clock: &mut MatchClock) -> Result<PhaseMarker> {
        if clock.phase() == ClockPhase::Idle {
            return Err(clock_error("half time cannot be marked before kick-off"));
        }
        if clock.is_second_half {
            return Err(clock_error("half time has already been marked"));
        }
        clock.elapsed_seconds = clock.regulation_duration / 2;
        clock.is_running = false;
        clock.start_anchor = None;
        clock.is_second_half = true;
        info!("Half time marked at {}s", clock.elapsed_seconds);
        Ok(PhaseMarker {
            kind: EventType::HalfTime,
            elapsed_seconds: clock.elapsed_seconds,
        })
    }

    /// Stops the clock where it stands.
    pub fn mark_full_time(&self, clock: &mut MatchClock) -> Result<PhaseMarker> {
        if clock.phase() == ClockPhase::Idle {
            return Err(clock_error("full time cannot be marked before kick-off"));
        }
        if clock.is_running {
            self.freeze(clock);
        }
        info!("Full time marked at {}s", clock.elapsed_seconds);
        Ok(PhaseMarker {
            kind: EventType::FullTime,
            elapsed_seconds: clock.elapsed_seconds,
        })
    }

    /// Back to `Idle(0, false)`, keeping the regulation length.
    pub fn reset(&self, clock: &mut MatchClock) {
        *clock = MatchClock::new(clock.regulation_duration);
    }

    fn freeze(&self, clock: &mut MatchClock) {
        clock.elapsed_seconds = self.tick(clock);
        clock.start_anchor = None;
        clock.is_running = false;
    }
}

pub fn clock_error(message: impl Into<String>) -> MatchdayError {
    MatchdayError::Clock(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_at(start_ms: i64) -> (ClockEngine, Arc<ManualTimeSource>) {
        let time = Arc::new(ManualTimeSource::new(start_ms));
        (ClockEngine::new(time.clone()), time)
    }

    #[test]
    fn tick_follows_anchor_regardless_of_reads() {
        let (engine, time) = engine_at(1_000_000);
        let mut clock = MatchClock::new(4200);
        engine.start(&mut clock).unwrap();

        for _ in 0..50 {
            time.advance_ms(100);
            let _ = engine.tick(&clock);
        }
        assert_eq!(engine.tick(&clock), 5);

        time.set(1_000_000 + 12_499);
        assert_eq!(engine.tick(&clock), 12);
        time.set(1_000_000 + 12_500);
        assert_eq!(engine.tick(&clock), 13);
        assert_eq!(clock.elapsed_seconds, 0, "tick must not mutate");
    }

    #[test]
    fn pause_freezes_elapsed() {
        let (engine, time) = engine_at(0);
        let mut clock = MatchClock::new(4200);
        engine.start(&mut clock).unwrap();
        time.advance_secs(90);
        assert_eq!(engine.pause(&mut clock).unwrap(), 90);
        assert!(clock.is_consistent());

        time.advance_secs(600);
        assert_eq!(engine.tick(&clock), 90);
        assert_eq!(engine.tick(&clock), 90);
        assert_eq!(clock.phase(), ClockPhase::Paused);
    }

    #[test]
    fn resume_continues_from_frozen_value() {
        let (engine, time) = engine_at(50_000);
        let mut clock = MatchClock::new(4200);
        engine.start(&mut clock).unwrap();
        time.advance_secs(30);
        engine.pause(&mut clock).unwrap();
        time.advance_secs(300);
        let anchor = engine.start(&mut clock).unwrap();
        assert_eq!(anchor, time.now_ms() - 30_000);
        time.advance_secs(15);
        assert_eq!(engine.tick(&clock), 45);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let (engine, _time) = engine_at(0);
        let mut clock = MatchClock::new(4200);
        assert!(engine.pause(&mut clock).is_err());
        assert!(engine.mark_half_boundary(&mut clock).is_err());
        engine.start(&mut clock).unwrap();
        let before = clock;
        assert!(engine.start(&mut clock).is_err());
        assert_eq!(clock, before);
    }

    #[test]
    fn half_boundary_jumps_to_half_regulation() {
        let (engine, time) = engine_at(0);
        let mut clock = MatchClock::new(4200);
        engine.start(&mut clock).unwrap();
        time.advance_secs(1800);
        let marker = engine.mark_half_boundary(&mut clock).unwrap();
        assert_eq!(marker.kind, EventType::HalfTime);
        assert_eq!(clock.elapsed_seconds, 2100);
        assert!(!clock.is_running);
        assert!(clock.is_second_half);
        assert!(clock.is_consistent());
        assert!(engine.mark_half_boundary(&mut clock).is_err());
    }

    #[test]
    fn half_boundary_truncates_odd_durations() {
        let (engine, _time) = engine_at(0);
        let mut clock = MatchClock::new(4201);
        clock.elapsed_seconds = 10;
        clock.has_started = true;
        engine.mark_half_boundary(&mut clock).unwrap();
        assert_eq!(clock.elapsed_seconds, 2100);
    }

    #[test]
    fn full_time_keeps_current_reading() {
        let (engine, time) = engine_at(0);
        let mut clock = MatchClock::new(4200);
        engine.start(&mut clock).unwrap();
        time.advance_secs(4321);
        let marker = engine.mark_full_time(&mut clock).unwrap();
        assert_eq!(marker.elapsed_seconds, 4321);
        assert_eq!(clock.elapsed_seconds, 4321);
        assert!(!clock.is_running);
    }

    #[test]
    fn markers_allowed_after_a_sub_second_start() {
        let (engine, time) = engine_at(0);
        let mut clock = MatchClock::new(4200);
        engine.start(&mut clock).unwrap();
        time.advance_ms(300);
        assert_eq!(engine.pause(&mut clock).unwrap(), 0);
        assert_eq!(clock.phase(), ClockPhase::Paused);

        let mut full_time = clock;
        assert!(engine.mark_full_time(&mut full_time).is_ok());
        let marker = engine.mark_half_boundary(&mut clock).unwrap();
        assert_eq!(marker.elapsed_seconds, 2100);

        engine.reset(&mut clock);
        assert_eq!(clock.phase(), ClockPhase::Idle);
        assert!(engine.mark_full_time(&mut clock).is_err());
    }

    #[test]
    fn regulation_duration_clamps_and_leaves_elapsed() {
        let (engine, _time) = engine_at(0);
        let mut clock = MatchClock::new(4200);
        clock.elapsed_seconds = 77;
        assert_eq!(engine.set_regulation_duration(&mut clock, -5), 0);
        assert_eq!(engine.set_regulation_duration(&mut clock, 3600), 3600);
        assert_eq!(clock.elapsed_seconds, 77);
        engine.reset(&mut clock);
        assert_eq!(clock, MatchClock::new(3600));
    }

    #[test]
    fn wall_clock_behind_anchor_reads_zero() {
        assert_eq!(elapsed_since(10_000, 9_000), 0);
        assert_eq!(elapsed_since(0, 1_499), 1);
    }
}
