//! Pluggable transmit-rate control.
//!
//! A strategy reads bandwidth telemetry and writes the transmit rate limit the sender obeys.
//! Strategies are shared between the sender thread (`adapt_to_congestion_window`), the
//! retransmission path (`react_to_losses`) and the maintenance thread (`update`), so every method
//! takes `&self` and keeps its mutable state in atomics. Changes to the rate limit go through a
//! compare-and-set loop so a loss reaction and a periodic update never overwrite each other.

mod loss_adaptive;
mod rate_modulation;

pub use self::{loss_adaptive::LossAdaptivePolicy, rate_modulation::RateModulationPolicy};

use crate::{
    config::Config,
    errors::{ProtocolError, ProtocolResult},
    telemetry::{BandwidthEstimator, TransmitRateLimiter},
};
use std::{fmt, str::FromStr, sync::Arc};

pub trait CongestionControl: Send + Sync {
    /// Recomputes the transmit rate limit from current telemetry. Must not block.
    fn update(&self);

    /// Given the space left in the send window, returns how much may be used this round.
    fn adapt_to_congestion_window(&self, space_available: u32) -> u32 {
        space_available
    }

    /// Loss notification. `0` reports packets that timed out more than once, any other value is
    /// the number of packets that timed out for the first time.
    fn react_to_losses(&self, _loss_code: u32) {}

    fn name(&self) -> &'static str;

    /// True while the strategy is still ramping up and refuses to shrink the limit.
    fn initialization_phase(&self) -> bool {
        false
    }
}

/// The base strategy: leaves whatever limit was configured untouched.
#[derive(Debug, Default)]
pub struct NoCongestionControl;

impl CongestionControl for NoCongestionControl {
    fn update(&self) {}

    fn name(&self) -> &'static str {
        "None"
    }
}

/// The strategies a session can be configured with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CongestionControlKind {
    RateModulation,
    LossAdaptive,
}

impl CongestionControlKind {
    /// Instantiates the strategy for a new session.
    pub fn build(
        self,
        config: &Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> ProtocolResult<Box<dyn CongestionControl>> {
        Ok(match self {
            CongestionControlKind::RateModulation => {
                Box::new(RateModulationPolicy::new(config, estimator, limiter)?)
            }
            CongestionControlKind::LossAdaptive => {
                Box::new(LossAdaptivePolicy::new(config, estimator, limiter)?)
            }
        })
    }

    /// Instantiates the strategy for a rehydrated session, keeping the limit already held by
    /// `limiter` and the saved initialization phase.
    pub fn resume(
        self,
        config: &Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
        initialization_phase: bool,
    ) -> ProtocolResult<Box<dyn CongestionControl>> {
        Ok(match self {
            CongestionControlKind::RateModulation => Box::new(RateModulationPolicy::resume(
                config,
                estimator,
                limiter,
                initialization_phase,
            )?),
            CongestionControlKind::LossAdaptive => {
                Box::new(LossAdaptivePolicy::resume(config, estimator, limiter)?)
            }
        })
    }

    pub(crate) fn code(kind: Option<CongestionControlKind>) -> u8 {
        match kind {
            None => 0,
            Some(CongestionControlKind::RateModulation) => 1,
            Some(CongestionControlKind::LossAdaptive) => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Option<CongestionControlKind>> {
        match code {
            0 => Some(None),
            1 => Some(Some(CongestionControlKind::RateModulation)),
            2 => Some(Some(CongestionControlKind::LossAdaptive)),
            _ => None,
        }
    }
}

impl FromStr for CongestionControlKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "TransmissionRateModulation" | "rate-modulation" => {
                Ok(CongestionControlKind::RateModulation)
            }
            "CongestionController" | "loss-adaptive" => Ok(CongestionControlKind::LossAdaptive),
            other => Err(ProtocolError::UnknownCongestionControl(other.to_owned())),
        }
    }
}

impl fmt::Display for CongestionControlKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CongestionControlKind::RateModulation => f.write_str("rate-modulation"),
            CongestionControlKind::LossAdaptive => f.write_str("loss-adaptive"),
        }
    }
}

/// `value * numerator / denominator`, truncated and clamped into `[floor, u32::MAX]`.
/// Negative inputs clamp to `floor`.
pub(crate) fn scale_rate(value: i64, numerator: i64, denominator: i64, floor: u32) -> u32 {
    let scaled = i128::from(value) * i128::from(numerator) / i128::from(denominator);
    if scaled < i128::from(floor) {
        floor
    } else if scaled > i128::from(u32::max_value()) {
        u32::max_value()
    } else {
        scaled as u32
    }
}

#[cfg(test)]
mod test {
    use super::{
        scale_rate, CongestionControl, CongestionControlKind, NoCongestionControl, ProtocolError,
    };
    use crate::{
        config::Config,
        telemetry::{AtomicRateLimit, SharedBandwidthEstimate, TransmitRateLimiter},
    };
    use std::sync::Arc;

    #[test]
    fn no_congestion_control_changes_nothing() {
        let strategy = NoCongestionControl;
        strategy.update();
        strategy.react_to_losses(0);
        assert_eq!(strategy.adapt_to_congestion_window(1500), 1500);
        assert!(!strategy.initialization_phase());
    }

    #[test]
    fn parses_legacy_and_short_names() {
        assert_eq!(
            "TransmissionRateModulation".parse::<CongestionControlKind>(),
            Ok(CongestionControlKind::RateModulation)
        );
        assert_eq!(
            "loss-adaptive".parse::<CongestionControlKind>(),
            Ok(CongestionControlKind::LossAdaptive)
        );
        assert_eq!(
            "cubic".parse::<CongestionControlKind>().unwrap_err(),
            ProtocolError::UnknownCongestionControl("cubic".to_owned())
        );
    }

    #[test]
    fn codes_round_trip() {
        for kind in vec![
            None,
            Some(CongestionControlKind::RateModulation),
            Some(CongestionControlKind::LossAdaptive),
        ] {
            assert_eq!(
                CongestionControlKind::from_code(CongestionControlKind::code(kind)),
                Some(kind)
            );
        }
        assert_eq!(CongestionControlKind::from_code(3), None);
    }

    #[test]
    fn build_installs_the_initial_threshold() {
        let config = Config::default().with_rate_modulation_initial_threshold(8000);
        let limiter = Arc::new(AtomicRateLimit::new(0));
        let strategy = CongestionControlKind::RateModulation
            .build(
                &config,
                Arc::new(SharedBandwidthEstimate::new()),
                limiter.clone(),
            )
            .unwrap();
        assert_eq!(strategy.name(), "TransmissionRateModulation");
        assert_eq!(limiter.transmit_rate_limit(), 8000);
    }

    #[test]
    fn scale_rate_truncates_and_clamps() {
        assert_eq!(scale_rate(1000, 11, 10, 1), 1100);
        assert_eq!(scale_rate(19, 11, 10, 1), 20);
        assert_eq!(scale_rate(0, 11, 10, 1), 1);
        assert_eq!(scale_rate(-5, 1, 1, 7), 7);
        assert_eq!(scale_rate(i64::max_value(), 11, 10, 1), u32::max_value());
    }
}
