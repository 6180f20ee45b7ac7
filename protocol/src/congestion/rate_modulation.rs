use super::{scale_rate, CongestionControl};
use crate::{
    config::Config,
    errors::{ProtocolError, ProtocolResult},
    telemetry::{modify_transmit_rate_limit, BandwidthEstimator, TransmitRateLimiter},
};
use log::{debug, trace};
use std::{
    cmp,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Adaptive rate limiting driven by the measured bandwidth.
///
/// Whenever the estimate reaches the current limit, the limit jumps to 110% of the estimate.
/// Once that has happened for the first time (the end of the initialization phase), an estimate
/// more than 20% below the limit pulls the limit down to the estimate. Smaller dips are ignored.
pub struct RateModulationPolicy {
    estimator: Arc<dyn BandwidthEstimator>,
    limiter: Arc<dyn TransmitRateLimiter>,
    min_transmit_rate_limit: u32,
    initialization_phase: AtomicBool,
}

impl RateModulationPolicy {
    pub fn new(
        config: &Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> ProtocolResult<Self> {
        let threshold = config.rate_modulation_initial_threshold();
        let policy = Self::resume(config, estimator, limiter, true)?;
        policy.limiter.set_transmit_rate_limit(threshold);
        debug!(
            "Rate modulation starting at {} B/s, floor {} B/s",
            threshold, policy.min_transmit_rate_limit
        );
        Ok(policy)
    }

    /// Rebuilds the policy for a rehydrated session. The limit already stored in `limiter` is
    /// kept as is.
    pub fn resume(
        config: &Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
        initialization_phase: bool,
    ) -> ProtocolResult<Self> {
        let threshold = config.rate_modulation_initial_threshold();
        if threshold == 0 {
            return Err(ProtocolError::InvalidConfiguration(
                "rate_modulation_initial_threshold must be positive.",
            ));
        }
        if config.min_transmit_rate_limit() > threshold {
            return Err(ProtocolError::InvalidConfiguration(
                "min_transmit_rate_limit is above rate_modulation_initial_threshold.",
            ));
        }

        estimator.activate(initial_assumed_bandwidth(threshold));

        Ok(Self {
            estimator,
            limiter,
            min_transmit_rate_limit: cmp::max(config.min_transmit_rate_limit(), 1),
            initialization_phase: AtomicBool::new(initialization_phase),
        })
    }
}

impl CongestionControl for RateModulationPolicy {
    fn update(&self) {
        let estimate = self.estimator.estimated_bandwidth();
        if estimate < 0 {
            trace!("No bandwidth estimate yet, keeping the transmit rate limit");
            return;
        }

        let mut grew = false;
        let changed = modify_transmit_rate_limit(&*self.limiter, |limit| {
            grew = estimate >= i64::from(limit);
            if grew {
                Some(scale_rate(estimate, 11, 10, self.min_transmit_rate_limit))
            } else if !self.initialization_phase.load(Ordering::Acquire)
                && i128::from(estimate) * 10 < i128::from(limit) * 8
            {
                Some(scale_rate(estimate, 1, 1, self.min_transmit_rate_limit))
            } else {
                None
            }
        });

        if grew && self.initialization_phase.swap(false, Ordering::AcqRel) {
            debug!(
                "Rate modulation initialization phase over at {} B/s",
                self.limiter.transmit_rate_limit()
            );
        }
        if let Some((limit, updated)) = changed {
            debug!("Transmit rate limit {} -> {} B/s", limit, updated);
        }
    }

    fn name(&self) -> &'static str {
        "TransmissionRateModulation"
    }

    fn initialization_phase(&self) -> bool {
        self.initialization_phase.load(Ordering::Acquire)
    }
}

/// Half of the threshold, converted from bytes/sec to bytes/ms.
fn initial_assumed_bandwidth(threshold: u32) -> u16 {
    cmp::min(threshold / 2 / 1000, u32::from(u16::max_value())) as u16
}
