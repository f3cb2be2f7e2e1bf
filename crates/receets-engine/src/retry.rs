//! # Conflict Retry
//!
//! Re-runs a read-apply-save closure when its versioned save lost a race
//! with another writer.
//!
//! ```text
//! attempt 1: read v3 ─► apply ─► save(v3) ✗ Conflict
//!            sleep 20ms (±jitter)
//! attempt 2: read v4 ─► apply ─► save(v4) ✓
//! ```
//!
//! The closure must be pure apart from its reads and its save: anything
//! with an external effect (gateway calls) happens before the retry loop
//! and only its result is captured.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::EngineResult;

/// Runs `attempt` until it returns something other than a conflict, or
/// until `max_attempts` conflicts have been seen. `record_id` is only logged.
pub async fn retry_on_conflict<T, F, Fut>(
    config: &RetryConfig,
    record_id: &str,
    mut attempt: F,
) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut backoff = config.backoff();
    let mut tries: u32 = 0;

    loop {
        tries += 1;
        match attempt().await {
            Err(err) if err.is_conflict() && tries < config.max_attempts => {
                let delay = backoff
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_millis(config.max_backoff_ms));
                warn!(
                    record_id = %record_id,
                    attempt = tries,
                    delay_ms = delay.as_millis() as u64,
                    "Record changed concurrently, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_conflict() => {
                warn!(record_id = %record_id, attempts = tries, "Giving up after repeated conflicts");
                return Err(err);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn conflict() -> EngineError {
        EngineError::Conflict {
            entity: "Sale".to_string(),
            id: "s-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut calls = 0;
        let result = retry_on_conflict(&fast(5), "s-1", || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 {
                    Err(conflict())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: EngineResult<()> = retry_on_conflict(&fast(3), "s-1", || {
            calls += 1;
            async { Err(conflict()) }
        })
        .await;

        assert!(matches!(result, Err(EngineError::Conflict { .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let mut calls = 0;
        let result: EngineResult<()> = retry_on_conflict(&fast(5), "s-1", || {
            calls += 1;
            async { Err(EngineError::invalid_state("voided")) }
        })
        .await;

        assert!(matches!(result, Err(EngineError::InvalidState(_))));
        assert_eq!(calls, 1);
    }
}
