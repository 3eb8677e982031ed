//! Deadline waits for the room actor's `select!` loop.

use tokio::time::{self, Instant};

/// Sleeps until `deadline`, or pends forever when there is none.
///
/// Used as a `select!` branch: with no deadline the branch simply never
/// wins and the other branches keep running.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_some_wakes_at_deadline() {
        let start = Instant::now();
        sleep_until(Some(start + Duration::from_secs(4))).await;
        assert_eq!(Instant::now() - start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_none_never_completes() {
        let result = time::timeout(Duration::from_secs(3600), sleep_until(None)).await;
        assert!(result.is_err());
    }
}
