use std::fmt;

use thiserror::Error;

pub type Result<T, E = MatchdayError> = std::result::Result<T, E>;

/// Which ledger list an index-addressed operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerList {
    Goals,
    Events,
}

impl fmt::Display for LedgerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerList::Goals => f.write_str("goals"),
            LedgerList::Events => f.write_str("events"),
        }
    }
}

/// Unified error type covering common failure scenarios across subsystems.
///
/// Every variant is recoverable: a rejected operation leaves the match
/// aggregate in its last valid state.
#[derive(Debug, Error)]
pub enum MatchdayError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("index {index} out of range for {list} (len {len})")]
    IndexOutOfRange {
        list: LedgerList,
        index: usize,
        len: usize,
    },
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("system event at index {0} cannot be edited or removed")]
    ProtectedSystemEvent(usize),
    #[error("clock error: {0}")]
    Clock(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("feed error: {0}")]
    Feed(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MatchdayError {
    /// True for failures caused by the caller's input rather than the environment.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MatchdayError::Validation(_)
                | MatchdayError::IndexOutOfRange { .. }
                | MatchdayError::Invariant(_)
                | MatchdayError::ProtectedSystemEvent(_)
                | MatchdayError::Clock(_)
        )
    }
}
