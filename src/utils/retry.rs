//! Retry utilities: fixed-delay backoff for required dependencies.
//!
//! The database and the queue broker have no degraded mode, so connection
//! attempts never give up. Logging is throttled so an unreachable dependency
//! does not flood the log.

use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tracing::{info, warn};

/// Attempts logged individually before switching to periodic logging.
const VERBOSE_ATTEMPTS: u64 = 3;

/// After the verbose phase, log every Nth failed attempt.
const LOG_EVERY: u64 = 12;

/// Constant backoff without an attempt limit.
pub fn reconnect_backoff(delay: Duration) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(delay)
        .without_max_times()
}

/// Whether the given failed attempt (1-based) should be logged.
pub fn should_log_attempt(attempt: u64) -> bool {
    attempt <= VERBOSE_ATTEMPTS || attempt % LOG_EVERY == 0
}

/// Run `connect` until it succeeds, sleeping `delay` between attempts.
///
/// The error arm is only reachable if the backoff is ever bounded; callers
/// propagate it with `?`.
pub async fn retry_forever<T, E, F, Fut>(name: &str, delay: Duration, connect: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u64 = 0;

    let result = connect
        .retry(reconnect_backoff(delay))
        .sleep(tokio::time::sleep)
        .notify(|err: &E, wait: Duration| {
            attempt += 1;
            if should_log_attempt(attempt) {
                warn!(
                    dependency = %name,
                    attempt,
                    error = %err,
                    "Connection failed, retrying in {:?}",
                    wait
                );
            }
        })
        .await;

    if result.is_ok() {
        info!(dependency = %name, "Connected");
    }
    result
}
