//! Byte-weighted admission gate bounding what is staged on local disk.
//!
//! A [`DiskQuota`] hands out [`QuotaReservation`]s whose sizes never sum past
//! the configured limit. Reservations give their bytes back exactly once, when
//! dropped, and wake any waiter blocked in [`DiskQuota::acquire`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("quota acquisition cancelled")]
    Cancelled,

    #[error("{requested} bytes can never fit in a limit of {limit} bytes")]
    ExceedsLimit { requested: u64, limit: u64 },
}

#[derive(Debug, Default)]
struct Usage {
    in_use: u64,
    peak: u64,
}

#[derive(Debug)]
pub struct DiskQuota {
    limit: u64,
    usage: Mutex<Usage>,
    released: Notify,
}

impl DiskQuota {
    pub fn new(limit: u64) -> Arc<Self> {
        Arc::new(Self {
            limit,
            usage: Mutex::new(Usage::default()),
            released: Notify::new(),
        })
    }

    /// Bytes currently reserved.
    pub fn in_use(&self) -> u64 {
        self.usage().in_use
    }

    /// Highest value [`in_use`](Self::in_use) has reached.
    pub fn peak(&self) -> u64 {
        self.usage().peak
    }

    /// Reserve `bytes`, waiting until enough earlier reservations are released.
    ///
    /// Returns [`AcquireError::Cancelled`] without reserving anything if
    /// `cancel` fires first.
    pub async fn acquire(
        self: &Arc<Self>,
        bytes: u64,
        cancel: &CancellationToken,
    ) -> Result<QuotaReservation, AcquireError> {
        if bytes > self.limit {
            return Err(AcquireError::ExceedsLimit {
                requested: bytes,
                limit: self.limit,
            });
        }

        loop {
            // Register interest before checking, so a release between the
            // check and the await is not missed.
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if cancel.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }
            if let Some(reservation) = self.try_acquire(bytes) {
                return Ok(reservation);
            }

            tokio::select! {
                _ = released => {}
                _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
            }
        }
    }

    /// Reserve `bytes` only if they fit right now.
    pub fn try_acquire(self: &Arc<Self>, bytes: u64) -> Option<QuotaReservation> {
        let mut usage = self.usage();
        if self.limit - usage.in_use < bytes {
            return None;
        }
        usage.in_use += bytes;
        usage.peak = usage.peak.max(usage.in_use);
        drop(usage);

        Some(QuotaReservation {
            quota: Arc::clone(self),
            bytes,
        })
    }

    fn release(&self, bytes: u64) {
        let mut usage = self.usage();
        debug_assert!(usage.in_use >= bytes, "released more than was reserved");
        usage.in_use = usage.in_use.saturating_sub(bytes);
        drop(usage);
        self.released.notify_waiters();
    }

    fn usage(&self) -> MutexGuard<'_, Usage> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bytes held against a [`DiskQuota`]; released on drop.
#[derive(Debug)]
pub struct QuotaReservation {
    quota: Arc<DiskQuota>,
    bytes: u64,
}

impl QuotaReservation {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        self.quota.release(self.bytes);
    }
}
