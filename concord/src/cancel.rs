//! Query cancellation
//!
//! Every query owns one `CancellationToken`. Firing it is idempotent and
//! observing it never blocks, so workers, the deadline timer and the stream
//! consumer can share it freely.
//!
//! Two ways a token fires:
//! - a deadline: [`cancel_after`] spawns a timer task
//! - the caller going away: the [`DropGuard`] from `token.drop_guard()` cancels
//!   when the response body holding it is dropped

use std::time::Duration;
use tokio::task::JoinHandle;
pub use tokio_util::sync::{CancellationToken, DropGuard};

/// Fire `token` after `timeout`. The timer exits early if the token is
/// cancelled some other way first.
pub fn cancel_after(token: CancellationToken, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "query deadline reached");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_guard_cancels() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        let guard: DropGuard = token.clone().drop_guard();
        assert!(!token.is_cancelled());

        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fires() {
        let token = CancellationToken::new();
        let timer = cancel_after(token.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!token.is_cancelled());

        timer.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_after_exits_when_cancelled_first() {
        let token = CancellationToken::new();
        let timer = cancel_after(token.clone(), Duration::from_secs(3600));
        token.cancel();
        // would hang for an hour if the timer ignored the token
        timer.await.unwrap();
    }
}
