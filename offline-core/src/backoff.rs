//! Truncated exponential backoff for sync retries (§4.7, §4.11).
//!
//! Base 2s, cap 60s, as specified; same shape as the teacher's own
//! backoff iterator, with this crate's own constants.

use std::cmp::min;
use std::time::Duration;

const INITIAL_WAIT_MS: u64 = 2_000;
const MAXIMUM_WAIT_MS: u64 = 60_000;
const EXP_BASE: u64 = 2;

/// An iterator of [`Duration`]s suitable for `tokio::time::sleep` between
/// sync retry attempts: 2s, 4s, 8s, ... capped at 60s.
pub fn get_backoff_iter() -> impl Iterator<Item = Duration> {
    (0u32..).map(|index| {
        let factor = EXP_BASE.saturating_pow(index);
        let wait_ms = INITIAL_WAIT_MS.saturating_mul(factor);
        Duration::from_millis(min(wait_ms, MAXIMUM_WAIT_MS))
    })
}
