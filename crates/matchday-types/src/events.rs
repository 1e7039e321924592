use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    clock::MatchClock,
    ledger::{Goal, MatchEvent},
    stats::{MomentumSnapshot, Scoreline, StatisticsSnapshot},
};

/// Kinds of notices sent to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    Lifecycle,
    Clock,
    Ledger,
    Persistence,
}

/// Immutable update envelope handed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerNotice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub timestamp: DateTime<Utc>,
    pub payload: NoticePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NoticePayload {
    Lifecycle(LifecycleNotice),
    Clock(ClockNotice),
    Ledger(LedgerNotice),
    Persistence(PersistenceNotice),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Restored,
    NewMatch,
    HalfTime,
    FullTime,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleNotice {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockNotice {
    pub clock: MatchClock,
    pub elapsed_seconds: u64,
}

/// One entry of the chronological view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineItem {
    Goal { index: usize, goal: Goal },
    Event { index: usize, event: MatchEvent },
}

impl TimelineItem {
    pub fn raw_time(&self) -> u32 {
        match self {
            TimelineItem::Goal { goal, .. } => goal.raw_time,
            TimelineItem::Event { event, .. } => event.raw_time,
        }
    }

    pub fn display_time(&self) -> &str {
        match self {
            TimelineItem::Goal { goal, .. } => &goal.display_time,
            TimelineItem::Event { event, .. } => &event.display_time,
        }
    }

    /// Position of the entry in its own ledger list.
    pub fn index(&self) -> usize {
        match self {
            TimelineItem::Goal { index, .. } | TimelineItem::Event { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerNotice {
    pub timeline: Vec<TimelineItem>,
    pub statistics: StatisticsSnapshot,
    pub momentum: MomentumSnapshot,
    pub score: Scoreline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceNotice {
    pub key: String,
    pub message: String,
}

impl TrackerNotice {
    pub fn new(kind: NoticeKind, payload: NoticePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, details: Option<String>) -> Self {
        Self::new(
            NoticeKind::Lifecycle,
            NoticePayload::Lifecycle(LifecycleNotice { phase, details }),
        )
    }

    pub fn persistence_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            NoticeKind::Persistence,
            NoticePayload::Persistence(PersistenceNotice {
                key: key.into(),
                message: message.into(),
            }),
        )
    }
}
