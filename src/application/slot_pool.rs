//! Worker slot pool: the capacity-K gate on concurrent rendering
//!
//! A slot is a semaphore permit. Holding the permit is what entitles a job
//! to be Assigned or Sampling; dropping it releases the slot. Ownership is
//! movable (`OwnedSemaphorePermit`), so the scheduler can hand a freed slot
//! straight to the next Pending job without a release/acquire round trip.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// An owned permit for one worker slot. Dropping it frees the slot.
pub type SlotHandle = OwnedSemaphorePermit;

/// Bounded pool of K worker slots.
#[derive(Debug, Clone)]
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl SlotPool {
    /// Create a pool with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Total slot capacity K.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Take a slot if one is free, without waiting.
    pub fn try_acquire(&self) -> Option<SlotHandle> {
        self.semaphore.clone().try_acquire_owned().ok()
    }

    /// Wait for a slot to become free.
    pub async fn acquire(&self) -> Result<SlotHandle> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Failed to acquire worker slot permit")
    }
}
