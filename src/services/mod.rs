use std::time::Duration;

use tokio::time::Instant;

pub mod address;
pub mod classifier;
pub mod queue;
pub mod results;
pub mod storage;
pub mod submission;
pub mod worker;

/// Longest wait any deadline is allowed to represent.
pub const MAX_WAIT: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + wait`, saturating at [`MAX_WAIT`] instead of overflowing.
pub(crate) fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .unwrap_or_else(|| start + MAX_WAIT)
}
