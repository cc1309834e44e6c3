//! # Write Retry
//!
//! Every ledger write opens with SQLite's write lock. A writer that finds
//! the lock taken past `busy_timeout` gets `DbError::Busy`; the whole
//! transaction is then rerun from scratch after an exponential pause.
//!
//! ```text
//! attempt ──► Busy ──► wait 50ms ──► attempt ──► Busy ──► wait 100ms ──► ...
//!                                                          │
//!                          max_elapsed passed ─────────────┴──► AllocationExhausted
//! ```
//!
//! Nothing from a failed attempt survives: the transaction rolled back, so
//! a serial is only ever handed out together with its committed entry.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::config::AllocationSettings;
use crate::error::{LedgerError, LedgerResult};

/// Creates the exponential backoff configuration.
pub(crate) fn create_backoff(settings: &AllocationSettings) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(settings.initial_interval_ms),
        max_interval: Duration::from_millis(settings.max_interval_ms),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_millis(settings.max_elapsed_ms)),
        ..Default::default()
    }
}

/// Runs `attempt` until it succeeds, fails for a non-transient reason, or
/// the backoff budget runs out.
pub(crate) async fn with_write_retry<T, F, Fut>(
    settings: &AllocationSettings,
    operation: &'static str,
    mut attempt: F,
) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut backoff = create_backoff(settings);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => match backoff.next_backoff() {
                Some(wait) => {
                    debug!(operation, attempt = attempts, ?wait, error = %e, "Write lock busy, retrying");
                    tokio::time::sleep(wait).await;
                }
                None => {
                    warn!(operation, attempts, "Write lock still busy, giving up");
                    return Err(LedgerError::AllocationExhausted { attempts });
                }
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banquet_db::DbError;

    fn fast() -> AllocationSettings {
        AllocationSettings {
            initial_interval_ms: 1,
            max_interval_ms: 2,
            max_elapsed_ms: 20,
        }
    }

    #[tokio::test]
    async fn test_retries_busy_then_succeeds() {
        let mut calls = 0;
        let result = with_write_retry(&fast(), "test", || {
            calls += 1;
            let busy = calls < 3;
            async move {
                if busy {
                    Err(LedgerError::Database(DbError::Busy("database is locked".into())))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let mut calls = 0;
        let result: LedgerResult<()> = with_write_retry(&fast(), "test", || {
            calls += 1;
            async { Err(LedgerError::PaymentNotFound("C1".into())) }
        })
        .await;

        assert!(matches!(result, Err(LedgerError::PaymentNotFound(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let result: LedgerResult<()> = with_write_retry(&fast(), "test", || async {
            Err(LedgerError::Database(DbError::Busy("database is locked".into())))
        })
        .await;

        match result {
            Err(LedgerError::AllocationExhausted { attempts }) => assert!(attempts > 1),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
