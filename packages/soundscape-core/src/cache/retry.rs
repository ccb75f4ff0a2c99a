//! Retry logic for transient download failures.
//!
//! Timeouts, connection failures and 5xx responses are retried with backoff;
//! anything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use super::CacheResult;

/// Runs `operation`, retrying transient errors once per entry in `delays`.
///
/// With `delays = [200ms, 500ms, 1000ms]` the operation runs at most four
/// times. The last error is returned when every attempt fails.
pub(crate) async fn with_retry<T, F, Fut>(
    label: &str,
    delays: &[Duration],
    mut operation: F,
) -> CacheResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < delays.len() => {
                let delay = delays[attempt];
                attempt += 1;
                log::warn!(
                    "[Cache] {} transient error: {} (retry {}/{} in {}ms)",
                    label,
                    e,
                    attempt,
                    delays.len(),
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Converts millisecond delays into durations.
pub(crate) fn delays_from_millis(ms: &[u64]) -> Vec<Duration> {
    ms.iter().copied().map(Duration::from_millis).collect()
}
