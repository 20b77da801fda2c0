//! Async polling helpers

use std::future::Future;
use std::time::Duration;

/// Awaits `fut`, failing if it takes longer than `duration`.
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}

/// Polls `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns whether the condition was observed.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    condition().await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn poll_until_sees_flag_set_later() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let seen = poll_until(Duration::from_secs(1), Duration::from_millis(5), || {
            let flag = Arc::clone(&flag);
            async move { flag.load(Ordering::SeqCst) }
        })
        .await;
        assert!(seen);
    }

    #[tokio::test]
    async fn timeout_ok_fails_slow_futures() {
        let slow = tokio::time::sleep(Duration::from_secs(5));
        let result = timeout_ok(Duration::from_millis(10), slow).await;
        assert!(result.is_err());
    }
}
