//! TTL-based mutual exclusion for job runs.

use std::sync::Arc;

use crate::{Result, store::TransientStore, time::now_ms, types::JobKind};

/// Per-job run lock backed by the transient store.
///
/// The store's TTL carries the expiry; the stored value records when the
/// holding run started. A crashed process never releases, so the TTL is the
/// liveness guarantee: once it elapses the next scheduled run proceeds.
#[derive(Clone)]
pub struct RunLock {
    transients: Arc<dyn TransientStore>,
}

impl RunLock {
    #[must_use]
    pub fn new(transients: Arc<dyn TransientStore>) -> Self {
        Self { transients }
    }

    /// Try to take the lock for `kind`.
    ///
    /// Returns `false` while an unexpired lock from a previous run exists.
    /// Get-then-set is race-free here: runs of one kind are never started
    /// concurrently by the scheduler.
    pub async fn try_acquire(&self, kind: JobKind) -> Result<bool> {
        let key = kind.lock_key();
        if self.transients.get(&key).await?.is_some() {
            return Ok(false);
        }
        self.transients
            .set_with_ttl(&key, &now_ms().to_string(), kind.lock_ttl_ms())
            .await?;
        Ok(true)
    }

    /// Drop the lock regardless of how the run ended.
    pub async fn release(&self, kind: JobKind) -> Result<()> {
        self.transients.delete(&kind.lock_key()).await
    }

    /// Whether an unexpired lock currently exists for `kind`.
    pub async fn is_held(&self, kind: JobKind) -> Result<bool> {
        Ok(self.transients.get(&kind.lock_key()).await?.is_some())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::store_memory::MemoryStore};

    fn make_lock() -> (Arc<MemoryStore>, RunLock) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), RunLock::new(store))
    }

    #[tokio::test]
    async fn acquire_then_acquire_fails() {
        let (_store, lock) = make_lock();
        assert!(lock.try_acquire(JobKind::Coupons).await.unwrap());
        assert!(!lock.try_acquire(JobKind::Coupons).await.unwrap());
    }

    #[tokio::test]
    async fn locks_are_per_kind() {
        let (_store, lock) = make_lock();
        assert!(lock.try_acquire(JobKind::Coupons).await.unwrap());
        assert!(lock.try_acquire(JobKind::Stock).await.unwrap());
    }

    #[tokio::test]
    async fn release_allows_reacquire() {
        let (_store, lock) = make_lock();
        assert!(lock.try_acquire(JobKind::Catalog).await.unwrap());
        lock.release(JobKind::Catalog).await.unwrap();
        assert!(lock.try_acquire(JobKind::Catalog).await.unwrap());
    }

    #[tokio::test]
    async fn release_without_acquire_is_noop() {
        let (_store, lock) = make_lock();
        lock.release(JobKind::Stock).await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_can_be_reacquired() {
        let (store, lock) = make_lock();
        assert!(lock.try_acquire(JobKind::Stock).await.unwrap());
        assert!(lock.is_held(JobKind::Stock).await.unwrap());

        store.expire_transient(&JobKind::Stock.lock_key());

        assert!(!lock.is_held(JobKind::Stock).await.unwrap());
        assert!(lock.try_acquire(JobKind::Stock).await.unwrap());
    }
}
