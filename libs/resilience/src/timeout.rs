/// Timeout wrapper for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Error returned when an operation exceeded its time budget.
#[derive(Debug, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Execute a future, failing with [`Elapsed`] if it takes longer than
/// `duration`.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    timeout(duration, future).await.map_err(|_| Elapsed(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_budget() {
        let result = with_timeout(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_elapsed_on_slow_future() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        assert!(matches!(result, Err(Elapsed(_))));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async {
            Err::<i32, &str>("inner failure")
        })
        .await
        .unwrap();

        assert_eq!(result, Err("inner failure"));
    }
}
