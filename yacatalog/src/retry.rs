//! Retry wrapper for catalog calls
//!
//! Every remote call made by the source controllers goes through
//! [`with_retry`]: a fixed number of attempts, a fixed delay between them and
//! a hard per-attempt timeout. There is no backoff and no jitter.

use crate::error::{CatalogError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Retry parameters shared by all catalog calls of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (at least 1)
    pub attempts: u32,
    /// Pause between two attempts
    pub delay: Duration,
    /// Per-attempt timeout, also handed to the client call itself
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            timeout,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempts are exhausted.
///
/// Each attempt is bounded by `policy.timeout`; an elapsed attempt counts as
/// [`CatalogError::Timeout`]. The last error is returned on exhaustion.
pub async fn with_retry<T, F, Fut, R>(
    policy: &RetryPolicy,
    name: &str,
    is_retryable: R,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: Fn(&CatalogError) -> bool,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout(name.to_string())),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(call = name, attempt, "Catalog call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < attempts && is_retryable(&err) => {
                warn!(call = name, attempt, attempts, "Catalog call failed, retrying: {}", err);
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(call = name, attempt, "Catalog call failed: {}", err);
                return Err(err);
            }
        }
    }
}
