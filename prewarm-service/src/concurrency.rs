//! Concurrency limiter for warmup workers.
//!
//! [`ConcurrencyLimiter`] caps the number of in-flight warmup requests using a tokio semaphore.
//! Clones share their permits, so all dispatches of a session draw from the same pool.

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Limits concurrent workers and tracks the in-flight count.
///
/// Permits are acquired with [`acquire`](Self::acquire) and automatically returned when the
/// [`ConcurrencyPermit`] is dropped.
#[derive(Clone, Debug)]
pub(crate) struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl ConcurrencyLimiter {
    /// Creates a new limiter with the given maximum number of permits.
    pub(crate) fn new(max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Waits until a permit is available and acquires it.
    pub(crate) async fn acquire(&self) -> Result<ConcurrencyPermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(ConcurrencyPermit { _permit: permit })
    }

    /// Returns the number of permits currently held.
    pub(crate) fn used_permits(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }
}

/// RAII guard for a concurrency permit.
///
/// Dropping this permit releases it back to the [`ConcurrencyLimiter`].
#[derive(Debug)]
pub(crate) struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn acquire_and_release() {
        let limiter = ConcurrencyLimiter::new(2);
        assert_eq!(limiter.used_permits(), 0);

        let p1 = limiter.acquire().await.unwrap();
        assert_eq!(limiter.used_permits(), 1);

        let p2 = limiter.acquire().await.unwrap();
        assert_eq!(limiter.used_permits(), 2);

        drop(p1);
        assert_eq!(limiter.used_permits(), 1);

        drop(p2);
        assert_eq!(limiter.used_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_at_capacity() {
        let limiter = ConcurrencyLimiter::new(1);
        let permit = limiter.acquire().await.unwrap();

        let mut acquire = Box::pin(limiter.acquire());
        tokio::select! {
            _ = &mut acquire => panic!("acquired a permit beyond capacity"),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }

        drop(permit);
        let _permit = acquire.await.unwrap();
        assert_eq!(limiter.used_permits(), 1);
    }

    #[tokio::test]
    async fn clones_share_permits() {
        let limiter = ConcurrencyLimiter::new(1);
        let clone = limiter.clone();

        let _permit = limiter.acquire().await.unwrap();
        assert_eq!(clone.used_permits(), 1);
        assert!(futures::poll!(Box::pin(clone.acquire())).is_pending());
    }
}
