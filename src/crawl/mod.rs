//! Crawl orchestration: run context, pacing, block policy and the page loop.

mod context;
mod orchestrator;
mod pacing;
mod policy;
mod state;

pub use context::{day_marker, RunContext};
pub use orchestrator::{CrawlError, CrawlOrchestrator, CrawlOutcome, StopReason};
pub use pacing::{DelayRange, Pacer, Pause};
pub use policy::BlockPolicy;
pub use state::CrawlState;
