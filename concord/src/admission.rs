//! Bounded admission of concurrent searches
//!
//! A query first tries to take a slot without waiting. If none is free the
//! caller is told it is queued, waits for a slot (or for its cancellation
//! token), and is told again once admitted:
//!
//! ```text
//! not started ──(slot free)──────────────────────────▶ Admitted
//! not started ──(would block)──▶ Queued ──(slot)──────▶ Admitted
//!                                   └──(cancelled)────▶ Err(Cancelled)
//! ```
//!
//! Only the two signalled states are values of [`AdmissionStatus`]; before the
//! first callback nothing has been reported. The slot is held by an
//! [`AdmissionHandle`] and returned when it drops.

use crate::cancel::CancellationToken;
use crate::interface::{ConcordError, ConcordResult};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Concurrent searches allowed by default
pub const DEFAULT_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStatus {
    Queued,
    Admitted,
}

/// No slot is free right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WouldBlock;

/// One held slot. Dropping it gives the slot back.
#[derive(Debug)]
pub struct AdmissionHandle {
    _permit: OwnedSemaphorePermit,
    queued: bool,
}

impl AdmissionHandle {
    /// True when the caller had to wait in the queue for this slot.
    pub fn was_queued(&self) -> bool {
        self.queued
    }

    /// Give the slot back now. Consuming `self` makes a second release impossible.
    pub fn release(self) {}
}

#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn try_admit(&self) -> Result<AdmissionHandle, WouldBlock> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionHandle {
                _permit: permit,
                queued: false,
            }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => Err(WouldBlock),
        }
    }

    /// Take a slot, waiting if needed.
    ///
    /// `on_status` is only called when the caller has to wait: once with
    /// `Queued` before waiting and once with `Admitted` after. An immediate
    /// admission produces no callbacks.
    pub async fn admit<F>(&self, cancel: &CancellationToken, mut on_status: F) -> ConcordResult<AdmissionHandle>
    where
        F: FnMut(AdmissionStatus),
    {
        if let Ok(handle) = self.try_admit() {
            return Ok(handle);
        }

        on_status(AdmissionStatus::Queued);
        tracing::debug!(capacity = self.capacity, "admission queued");

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConcordError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit,
        };

        // the semaphore is never closed
        let permit = permit.map_err(|_| ConcordError::Cancelled)?;

        on_status(AdmissionStatus::Admitted);
        Ok(AdmissionHandle {
            _permit: permit,
            queued: true,
        })
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
