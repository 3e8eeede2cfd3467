//! Admission control for checker jobs and subprocess invocations.
//!
//! An [`AdmissionController`] is a counting slot pool built on a tokio
//! semaphore. Acquiring returns a [`Slot`]; dropping the slot releases it.
//! [`Admission`] pairs the job-level and invocation-level pools according
//! to the configured [`PoolMode`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolMode;

#[derive(Debug)]
struct Pool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounded pool of execution slots. Clones share the same pool.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    pool: Arc<Pool>,
}

impl AdmissionController {
    /// Create a pool with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pool: Arc::new(Pool {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_use: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait until a slot is free and take it.
    pub async fn acquire(&self) -> Slot {
        let permit = self
            .pool
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        let held = self.pool.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.pool.peak.fetch_max(held, Ordering::SeqCst);
        Slot {
            _permit: permit,
            pool: Arc::clone(&self.pool),
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.pool.in_use.load(Ordering::SeqCst)
    }

    /// Highest number of slots held at once since creation.
    pub fn peak(&self) -> usize {
        self.pool.peak.load(Ordering::SeqCst)
    }

    /// Whether two controllers draw from the same pool.
    pub fn same_pool(&self, other: &AdmissionController) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }
}

/// A held slot. Released when dropped.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    pool: Arc<Pool>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        // Runs before the permit is returned, so in_use never exceeds capacity.
        self.pool.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Job and invocation pools used by one engine.
#[derive(Debug, Clone)]
pub struct Admission {
    mode: PoolMode,
    jobs: AdmissionController,
    invocations: AdmissionController,
}

impl Admission {
    /// Build the pools for `mode`.
    ///
    /// A shared pool below two slots could never admit a per-target child
    /// while its parent holds the only slot, so it is built split instead.
    pub fn new(capacity: usize, mode: PoolMode) -> Self {
        let mode = if mode == PoolMode::Shared && capacity < 2 {
            log::warn!(
                "shared pool with capacity {} cannot run per-target checkers, using split pools",
                capacity
            );
            PoolMode::Split
        } else {
            mode
        };

        match mode {
            PoolMode::Split => Self {
                mode,
                jobs: AdmissionController::new(capacity),
                invocations: AdmissionController::new(capacity),
            },
            PoolMode::Shared => {
                let pool = AdmissionController::new(capacity);
                Self {
                    mode,
                    jobs: pool.clone(),
                    invocations: pool,
                }
            }
        }
    }

    /// Effective pool mode.
    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    /// Pool gating checker jobs (the outer slot).
    pub fn jobs(&self) -> &AdmissionController {
        &self.jobs
    }

    /// Pool gating subprocess launches.
    pub fn invocations(&self) -> &AdmissionController {
        &self.invocations
    }

    /// Slot for a batch invocation.
    ///
    /// In shared mode the checker's outer slot already covers its single
    /// invocation, so nothing more is taken.
    pub async fn batch_slot(&self) -> Option<Slot> {
        match self.mode {
            PoolMode::Split => Some(self.invocations.acquire().await),
            PoolMode::Shared => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_capacity_minimum_one() {
        let pool = AdmissionController::new(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = AdmissionController::new(2);
        let a = pool.acquire().await;
        let b = pool.acquire().await;
        assert_eq!(pool.in_use(), 2);
        drop(a);
        assert_eq!(pool.in_use(), 1);
        drop(b);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.peak(), 2);
    }

    #[tokio::test]
    async fn test_acquire_blocks_when_full() {
        let pool = AdmissionController::new(1);
        let held = pool.acquire().await;

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _slot = pool.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should be admitted after release")
            .unwrap();
        assert_eq!(pool.peak(), 1);
    }

    #[tokio::test]
    async fn test_peak_never_exceeds_capacity() {
        let pool = AdmissionController::new(3);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let _slot = pool.acquire().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(pool.peak() <= 3);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_split_mode_uses_independent_pools() {
        let admission = Admission::new(4, PoolMode::Split);
        assert_eq!(admission.mode(), PoolMode::Split);
        assert!(!admission.jobs().same_pool(admission.invocations()));
        assert_eq!(admission.jobs().capacity(), 4);
        assert_eq!(admission.invocations().capacity(), 4);
    }

    #[test]
    fn test_shared_mode_uses_one_pool() {
        let admission = Admission::new(4, PoolMode::Shared);
        assert_eq!(admission.mode(), PoolMode::Shared);
        assert!(admission.jobs().same_pool(admission.invocations()));
    }

    #[test]
    fn test_shared_mode_below_two_becomes_split() {
        let admission = Admission::new(1, PoolMode::Shared);
        assert_eq!(admission.mode(), PoolMode::Split);
    }

    #[tokio::test]
    async fn test_batch_slot_by_mode() {
        let split = Admission::new(2, PoolMode::Split);
        let slot = split.batch_slot().await;
        assert!(slot.is_some());
        assert_eq!(split.invocations().in_use(), 1);

        let shared = Admission::new(2, PoolMode::Shared);
        assert!(shared.batch_slot().await.is_none());
        assert_eq!(shared.invocations().in_use(), 0);
    }
}
