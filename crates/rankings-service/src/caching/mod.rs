//! Caching of computed rankings.
//!
//! Every [`RankingKind`](crate::types::RankingKind) owns one slot holding the last computed
//! payload and its expiry. Recomputations are deduplicated per kind, see
//! [`RankingCache::compute_memoized`].

mod error;
mod memory;

pub use error::{ComputationError, ComputationFailed};
pub use memory::{CacheLookup, RankingCache};
