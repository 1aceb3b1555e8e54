//! Retry policy shared by both state machines (spec.md §4.9 "Algorithm for
//! one job").

/// Seconds to wait before attempt `n` (1-indexed), per spec.md §4.9.
pub const RETRY_DELAYS_SECS: [u64; 7] = [5, 10, 60, 600, 1800, 3600, 43200];

/// `true` once `job_try` exceeds the retry table and the job must be
/// written terminal (`send_request_failed`).
pub fn retries_exhausted(job_try: u32) -> bool {
    job_try as usize > RETRY_DELAYS_SECS.len()
}

/// The defer, in milliseconds, for `Retry(defer_ms)` given the attempt
/// that just failed.
pub fn defer_ms_for_try(job_try: u32) -> i64 {
    let idx = (job_try.saturating_sub(1)) as usize;
    let secs = RETRY_DELAYS_SECS.get(idx).copied().unwrap_or(*RETRY_DELAYS_SECS.last().unwrap());
    secs as i64 * 1000
}
