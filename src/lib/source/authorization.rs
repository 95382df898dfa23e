use async_trait::async_trait;
use tracing::*;

use crate::error::{PipelineError, Result};

/// Grants or refuses access to the frame source.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(false)` is a refusal; errors are treated as refusals by [`authorize_with_retry`].
    async fn request(&self) -> anyhow::Result<bool>;
}

/// Authorizer for sources that need no permission.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

#[async_trait]
impl Authorizer for AlwaysGranted {
    async fn request(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Asks `authorizer` up to `1 + retries` times.
#[instrument(level = "debug", skip(authorizer))]
pub async fn authorize_with_retry(authorizer: &dyn Authorizer, retries: u32) -> Result<()> {
    let attempts = retries.saturating_add(1);

    for attempt in 1..=attempts {
        match authorizer.request().await {
            Ok(true) => {
                debug!("Authorization granted on attempt {attempt}");
                return Ok(());
            }
            Ok(false) => warn!("Authorization refused (attempt {attempt}/{attempts})"),
            Err(error) => {
                warn!("Authorization request failed (attempt {attempt}/{attempts}): {error:#}")
            }
        }
    }

    Err(PipelineError::AuthorizationDenied { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use anyhow::anyhow;

    /// Refuses the first `refusals` requests, fails on the very first one.
    struct Reluctant {
        refusals: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Authorizer for Reluctant {
        async fn request(&self) -> anyhow::Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Err(anyhow!("dialog dismissed"));
            }
            Ok(call >= self.refusals)
        }
    }

    #[tokio::test]
    async fn always_granted_succeeds_first_time() {
        assert!(authorize_with_retry(&AlwaysGranted, 0).await.is_ok());
    }

    #[tokio::test]
    async fn retries_until_granted() {
        let authorizer = Reluctant {
            refusals: 3,
            calls: AtomicU32::new(0),
        };

        authorize_with_retry(&authorizer, 5).await.unwrap();
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_budget() {
        let authorizer = Reluctant {
            refusals: u32::MAX,
            calls: AtomicU32::new(0),
        };

        let result = authorize_with_retry(&authorizer, 2).await;
        assert!(matches!(
            result,
            Err(PipelineError::AuthorizationDenied { attempts: 3 })
        ));
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 3);
    }
}
