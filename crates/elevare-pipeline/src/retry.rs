use elevare_core::{StageError, StageFailure};
use std::future::Future;
use tracing::{error, warn};

/// Runs `attempt` and, if it fails, runs it exactly once more.
///
/// The attempt number (1 or 2) is passed to the closure. A cancelled attempt
/// is never retried. The error of the second attempt is the one reported.
pub async fn retry_once<T, F, Fut>(stage: &str, mut attempt: F) -> Result<T, StageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StageFailure>>,
{
    match attempt(1).await {
        Ok(value) => Ok(value),
        Err(StageFailure::Cancelled) => Err(StageError::new(stage, StageFailure::Cancelled)),
        Err(first) => {
            warn!(stage, attempt = 1, error = %first, "Stage attempt failed, retrying once");
            attempt(2).await.map_err(|second| {
                if !matches!(second, StageFailure::Cancelled) {
                    error!(stage, attempt = 2, error = %second, "Stage failed after retry");
                }
                StageError::new(stage, second)
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use elevare_core::CapabilityError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn research_down() -> StageFailure {
        CapabilityError::Research("down".into()).into()
    }

    #[tokio::test]
    async fn first_success_runs_once() {
        let calls = AtomicU32::new(0);
        let value = retry_once("s", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StageFailure>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_one_failure() {
        let value = retry_once("s", |attempt| async move {
            if attempt == 1 {
                Err(research_down())
            } else {
                Ok("ok")
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "ok");
    }

    #[tokio::test]
    async fn gives_up_after_two_attempts() {
        let calls = AtomicU32::new(0);
        let err = retry_once("research", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(research_down())
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.stage, "research");
        assert_eq!(err.failure, research_down());
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_once("s", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StageFailure::Cancelled)
        })
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
