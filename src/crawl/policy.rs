//! What to do when a listing page looks blocked.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Block handling policy. The default aborts the run on the first block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BlockPolicy {
    #[default]
    Abort,
    /// Refetch up to `attempts` extra times, waiting `backoff_secs * n` before attempt n.
    Retry { attempts: u32, backoff_secs: u64 },
}

impl BlockPolicy {
    /// Delay before retry number `attempt` (1-based), or `None` when retries are exhausted.
    pub fn retry_delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            BlockPolicy::Abort => None,
            BlockPolicy::Retry {
                attempts,
                backoff_secs,
            } => {
                if attempt == 0 || attempt > attempts {
                    None
                } else {
                    Some(Duration::from_secs(
                        backoff_secs.saturating_mul(u64::from(attempt)),
                    ))
                }
            }
        }
    }
}
