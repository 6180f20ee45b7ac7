use super::{scale_rate, CongestionControl};
use crate::{
    config::Config,
    errors::{ProtocolError, ProtocolResult},
    telemetry::{modify_transmit_rate_limit, BandwidthEstimator, TransmitRateLimiter},
};
use log::{debug, warn};
use std::{cmp, sync::Arc};

/// Bytes per second are spread over pacing intervals of 100ms.
const PACING_INTERVALS_PER_SEC: u32 = 10;

/// Additive-increase / multiplicative-decrease on the transmit rate limit.
///
/// Every update adds a fixed step, never climbing past 110% of a known bandwidth estimate.
/// Repeated timeouts halve the limit; first-time timeouts trim an eighth.
pub struct LossAdaptivePolicy {
    estimator: Arc<dyn BandwidthEstimator>,
    limiter: Arc<dyn TransmitRateLimiter>,
    additive_increase: u32,
    min_transmit_rate_limit: u32,
}

impl LossAdaptivePolicy {
    pub fn new(
        config: &Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> ProtocolResult<Self> {
        let policy = Self::resume(config, estimator, limiter)?;
        policy
            .limiter
            .set_transmit_rate_limit(config.rate_modulation_initial_threshold());
        Ok(policy)
    }

    pub fn resume(
        config: &Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> ProtocolResult<Self> {
        if config.rate_modulation_initial_threshold() == 0 {
            return Err(ProtocolError::InvalidConfiguration(
                "rate_modulation_initial_threshold must be positive.",
            ));
        }
        if config.min_transmit_rate_limit() > config.rate_modulation_initial_threshold() {
            return Err(ProtocolError::InvalidConfiguration(
                "min_transmit_rate_limit is above rate_modulation_initial_threshold.",
            ));
        }

        Ok(Self {
            estimator,
            limiter,
            additive_increase: config.loss_adaptive_increase(),
            min_transmit_rate_limit: cmp::max(config.min_transmit_rate_limit(), 1),
        })
    }

    fn decrease(&self, reduce: impl Fn(u32) -> u32) {
        let floor = self.min_transmit_rate_limit;
        let changed = modify_transmit_rate_limit(&*self.limiter, |limit| {
            Some(cmp::max(reduce(limit), floor))
        });
        match changed {
            Some((_, reduced)) if reduced == floor => {
                warn!("Transmit rate limit down to its floor of {} B/s", reduced)
            }
            Some((limit, reduced)) => {
                debug!("Transmit rate limit lowered {} -> {} B/s after losses", limit, reduced)
            }
            None => {}
        }
    }
}

impl CongestionControl for LossAdaptivePolicy {
    fn update(&self) {
        let estimate = self.estimator.estimated_bandwidth();
        let ceiling = if estimate >= 0 {
            Some(scale_rate(estimate, 11, 10, self.min_transmit_rate_limit))
        } else {
            None
        };

        modify_transmit_rate_limit(&*self.limiter, |limit| {
            let increased = limit.saturating_add(self.additive_increase);
            Some(match ceiling {
                Some(ceiling) => cmp::min(increased, cmp::max(ceiling, limit)),
                None => increased,
            })
        });
    }

    fn adapt_to_congestion_window(&self, space_available: u32) -> u32 {
        let per_interval = cmp::max(
            self.limiter.transmit_rate_limit() / PACING_INTERVALS_PER_SEC,
            1,
        );
        cmp::min(space_available, per_interval)
    }

    fn react_to_losses(&self, loss_code: u32) {
        if loss_code == 0 {
            self.decrease(|limit| limit / 2);
        } else {
            self.decrease(|limit| limit - limit / 8);
        }
    }

    fn name(&self) -> &'static str {
        "CongestionController"
    }
}
