//! Derived views over the ledger: cached statistics and momentum.

mod cache;
mod momentum;

pub use cache::{compute_cache_key, compute_statistics, StatisticsCache};
pub use momentum::{compute_momentum, MomentumEngine, MomentumWeights};
