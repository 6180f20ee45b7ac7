//! Seams between the congestion-control strategies and the rest of the transport: where bandwidth
//! estimates come from and where the transmit rate limit goes.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Source of bandwidth estimates, in bytes per second.
pub trait BandwidthEstimator: Send + Sync {
    /// Latest estimate. Negative means no estimate is available yet.
    fn estimated_bandwidth(&self) -> i64;

    /// Starts estimation, seeding the estimator with an assumed bandwidth in bytes per millisecond.
    fn activate(&self, initial_assumed_bandwidth: u16);
}

/// Holder of the transmit rate limit, in bytes per second. Read by the sender on every
/// transmission opportunity and written by the congestion-control strategy from both the
/// maintenance thread and the retransmission path.
pub trait TransmitRateLimiter: Send + Sync {
    fn transmit_rate_limit(&self) -> u32;

    fn set_transmit_rate_limit(&self, limit: u32);

    /// Stores `new` only if the limit still equals `current`.
    fn compare_and_set_transmit_rate_limit(&self, current: u32, new: u32) -> bool;
}

/// Read-modify-write of the limit that cannot lose a concurrent update. `f` is retried on the
/// fresh value until the swap succeeds or it returns `None`. Returns `(old, new)` on a change.
pub(crate) fn modify_transmit_rate_limit<F>(
    limiter: &dyn TransmitRateLimiter,
    mut f: F,
) -> Option<(u32, u32)>
where
    F: FnMut(u32) -> Option<u32>,
{
    let mut current = limiter.transmit_rate_limit();
    loop {
        let new = f(current)?;
        if new == current {
            return None;
        }
        if limiter.compare_and_set_transmit_rate_limit(current, new) {
            return Some((current, new));
        }
        current = limiter.transmit_rate_limit();
    }
}

/// Bandwidth estimate published by the SAck sampling code and read by the maintenance thread.
#[derive(Debug)]
pub struct SharedBandwidthEstimate {
    estimate: AtomicI64,
    initial_assumed_bandwidth: AtomicU32,
}

impl SharedBandwidthEstimate {
    pub fn new() -> Self {
        Self {
            estimate: AtomicI64::new(-1),
            initial_assumed_bandwidth: AtomicU32::new(0),
        }
    }

    pub fn publish(&self, bytes_per_sec: i64) {
        self.estimate.store(bytes_per_sec, Ordering::Release);
    }

    /// Bytes per millisecond the estimator was seeded with on activation.
    pub fn initial_assumed_bandwidth(&self) -> u16 {
        self.initial_assumed_bandwidth.load(Ordering::Acquire) as u16
    }
}

impl Default for SharedBandwidthEstimate {
    fn default() -> Self {
        Self::new()
    }
}

impl BandwidthEstimator for SharedBandwidthEstimate {
    fn estimated_bandwidth(&self) -> i64 {
        self.estimate.load(Ordering::Acquire)
    }

    fn activate(&self, initial_assumed_bandwidth: u16) {
        self.initial_assumed_bandwidth
            .store(u32::from(initial_assumed_bandwidth), Ordering::Release);
        // No samples yet.
        self.estimate.store(-1, Ordering::Release);
    }
}

/// Lock-free rate limit cell. Zero means unlimited.
#[derive(Debug, Default)]
pub struct AtomicRateLimit {
    limit: AtomicU32,
}

impl AtomicRateLimit {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: AtomicU32::new(limit),
        }
    }

    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.transmit_rate_limit() == 0
    }
}

impl TransmitRateLimiter for AtomicRateLimit {
    #[inline]
    fn transmit_rate_limit(&self) -> u32 {
        self.limit.load(Ordering::Acquire)
    }

    #[inline]
    fn set_transmit_rate_limit(&self, limit: u32) {
        self.limit.store(limit, Ordering::Release);
    }

    fn compare_and_set_transmit_rate_limit(&self, current: u32, new: u32) -> bool {
        self.limit
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
