use std::{future::Future, time::Duration};

use derive_more::{Display, Error};
use tracing::warn;

use crate::CallError;

/// Delay before each retry. Total attempts are bounded by
/// the schedule length plus the initial call.
const SCHEDULE: [Duration; 3] = [
    Duration::from_millis(250),
    Duration::from_millis(750),
    Duration::from_millis(1750),
];

/// An upstream endpoint kept failing after the bounded retry schedule.
#[derive(Debug, Display, Error)]
#[display(fmt = "upstream unavailable after {} attempts: {}", attempts, source)]
pub struct UpstreamUnavailable {
    pub attempts: usize,
    pub source: CallError,
}

/// Run an upstream call, retrying transient failures on the backoff schedule.
pub(crate) async fn with_retries<T, F, Fut>(
    operation: &str,
    mut call: F,
) -> Result<T, UpstreamUnavailable>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut attempt = 0;

    loop {
        match call().await {
            Ok(val) => return Ok(val),
            Err(error) if attempt < SCHEDULE.len() => {
                warn!(%operation, %error, attempt, "upstream call failed, retrying");

                tokio::time::sleep(SCHEDULE[attempt]).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(UpstreamUnavailable {
                    attempts: attempt + 1,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::with_retries;
    use crate::CallError;

    #[tokio::test(start_paused = true)]
    async fn exhausts_bounded_schedule() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = with_retries("test", || {
            calls.fetch_add(1, Ordering::SeqCst);

            async {
                Err(CallError::RpcError {
                    code: -32000,
                    message: String::from("node is behind"),
                })
            }
        })
        .await;

        let error = result.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(error.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_midway() {
        let calls = AtomicUsize::new(0);

        let result = with_retries("test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);

            async move {
                if attempt < 2 {
                    Err(CallError::RpcError {
                        code: -32000,
                        message: String::from("node is behind"),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
