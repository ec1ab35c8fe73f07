use std::future::Future;
use std::time::Duration;

use crate::config::IntakeConfig;
use crate::error::{AppError, AppResult};

/// Bounds every outbound call: a hard timeout per attempt and, for idempotent reads,
/// a limited number of retries with linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub read_retries: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            read_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    pub fn from_config(config: &IntakeConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.call_timeout_secs.max(1)),
            read_retries: config.read_retries,
            ..Self::default()
        }
    }

    /// Single attempt. Used for anything with side effects (sending an SMS, writing a lead).
    pub async fn run<T, F>(&self, what: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("{} timed out after {:?}", what, self.timeout);
                Err(AppError::Timeout(format!("{} timed out", what)))
            }
        }
    }

    /// Retries idempotent reads. Validation and auth failures are returned immediately.
    pub async fn run_read<T, F, Fut>(&self, what: &str, mut make: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.run(what, make()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.read_retries && is_transient(&e) => {
                    attempt += 1;
                    log::warn!("{} failed (attempt {}): {}, retrying", what, attempt, e);
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_transient(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Timeout(_) | AppError::ReqwestError(_) | AppError::LoadError(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(50),
            read_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let policy = fast_policy();
        let result: AppResult<()> = policy
            .run("slow call", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_read_retries_transient_errors() {
        let policy = fast_policy();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = policy
            .run_read("list", move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(AppError::LoadError("flaky".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_read_gives_up_after_budget() {
        let policy = fast_policy();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: AppResult<()> = policy
            .run_read("list", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::LoadError("down".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_read_does_not_retry_auth_errors() {
        let policy = fast_policy();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: AppResult<()> = policy
            .run_read("list", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::AuthError("bad key".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(AppError::AuthError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
