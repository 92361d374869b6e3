//! Cooperative cancellation for data-access futures.
//!
//! Dropping a future is always a valid way to cancel it. A [`CancellationToken`]
//! additionally lets a caller cancel work it does not own, and turns that into an
//! ordinary [`AppError::Cancelled`] result.

use std::future::Future;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use common::{AppError, AppResult};

pub trait CancelExt<T>: Future<Output = AppResult<T>> + Send + Sized {
    /// Resolve to `Cancelled` as soon as `token` fires, dropping the inner future.
    ///
    /// A token that already fired wins even if the inner future is ready.
    fn with_cancellation<'a>(self, token: &'a CancellationToken) -> BoxFuture<'a, AppResult<T>>
    where
        Self: 'a,
        T: Send + 'a,
    {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AppError::Cancelled),
                result = self => result,
            }
        })
    }
}

impl<T, F> CancelExt<T> for F where F: Future<Output = AppResult<T>> + Send {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn completes_when_the_token_stays_quiet() {
        let token = CancellationToken::new();
        let result = async { Ok::<_, AppError>(7) }
            .with_cancellation(&token)
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn fired_token_wins_over_a_ready_future() {
        let token = CancellationToken::new();
        token.cancel();

        let result = async { Ok::<_, AppError>(7) }
            .with_cancellation(&token)
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelling_mid_flight_drops_the_inner_future() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });

        let result = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, AppError>(())
        }
        .with_cancellation(&token)
        .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
