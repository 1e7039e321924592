//! Shared domain types for the Matchday project.

pub mod clock;
pub mod config;
pub mod events;
pub mod ledger;
pub mod record;
pub mod stats;

mod errors;

pub use errors::{LedgerList, MatchdayError, Result};
