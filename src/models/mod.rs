//! Data models for flatwatch.

mod ad;
mod dedup;

pub use ad::{AdCandidate, AdDetail};
pub use dedup::{DedupRecord, DedupVerdict};
