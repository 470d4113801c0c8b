use crate::remote::RemoteConnection;
use metrics::counter;
use reconcile_core::backoff::RetryPolicy;
use reconcile_core::{Error, Result};
use tracing::{debug, instrument, warn};

/// Deletes `file_path`, retrying with a fixed pause. Returns the attempts used.
#[instrument(skip(connection, policy), fields(max_attempts = policy.max_attempts))]
pub async fn remove_with_retry(
    connection: &mut dyn RemoteConnection,
    file_path: &str,
    policy: &RetryPolicy,
) -> Result<u32> {
    let mut backoff = policy.create_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;
        counter!("reconcile_delete_attempts_total").increment(1);

        let err = match connection.delete(file_path).await {
            Ok(()) => {
                debug!(path = file_path, attempt, "Deleted source file");
                return Ok(attempt);
            }
            Err(e) => e,
        };

        match policy.delay_after(attempt, &mut backoff) {
            Some(delay) => {
                warn!(
                    path = file_path,
                    attempt,
                    retry_after_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt to delete file failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(
                    path = file_path,
                    attempts = attempt,
                    error = %err,
                    "Giving up on deleting file"
                );
                return Err(Error::DeletionFailed {
                    path: file_path.to_string(),
                    attempts: attempt,
                    details: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemoteConnection, RemoteError};
    use std::time::Duration;
    use tokio::time::Instant;

    fn failing_then_ok(failures: u32) -> MockRemoteConnection {
        let mut connection = MockRemoteConnection::new();
        let mut seen = 0;
        connection
            .expect_delete()
            .withf(|path| path == "/outbound/a.csv")
            .returning(move |_| {
                seen += 1;
                if seen <= failures {
                    Err(RemoteError::Reply(format!("450 busy ({})", seen)))
                } else {
                    Ok(())
                }
            });
        connection
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_has_no_delay() {
        let mut connection = failing_then_ok(0);
        let started = Instant::now();

        let attempts = remove_with_retry(&mut connection, "/outbound/a.csv", &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_m_failures_with_m_delays() {
        let mut connection = failing_then_ok(2);
        let started = Instant::now();

        let attempts = remove_with_retry(&mut connection, "/outbound/a.csv", &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_returns_last_error() {
        let mut connection = failing_then_ok(u32::MAX);
        let started = Instant::now();

        let err = remove_with_retry(&mut connection, "/outbound/a.csv", &RetryPolicy::default())
            .await
            .unwrap_err();

        match err {
            Error::DeletionFailed {
                path,
                attempts,
                details,
            } => {
                assert_eq!(path, "/outbound/a.csv");
                assert_eq!(attempts, 3);
                assert!(details.contains("(3)"), "last error expected, got {details}");
            }
            other => panic!("unexpected error: {other}"),
        }
        // no pause after the final failure
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_controls_attempts_and_delay() {
        let mut connection = failing_then_ok(4);
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        let started = Instant::now();

        let attempts = remove_with_retry(&mut connection, "/outbound/a.csv", &policy)
            .await
            .unwrap();

        assert_eq!(attempts, 5);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}
