use crate::{
    congestion::CongestionControlKind,
    errors::{ProtocolError, ProtocolResult},
};
use std::time::Duration;

const MIN_SUSPEND_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub struct Config {
    /// Congestion-control strategy to run. `None` keeps the static `transmit_rate_limit`.
    congestion_control: Option<CongestionControlKind>,
    /// Static rate limit in bytes per second, used when no strategy is configured.
    /// A value of zero means no limit.
    transmit_rate_limit: u32,
    /// Starting rate limit (bytes/sec) of the adaptive strategies.
    rate_modulation_initial_threshold: u32,
    /// The adaptive strategies never push the rate limit below this value (bytes/sec).
    min_transmit_rate_limit: u32,
    /// Bytes/sec added on every update by the loss-adaptive strategy.
    loss_adaptive_increase: u32,
    /// Open connections with the simple connect / ack exchange instead of the cookie handshake.
    use_two_way_handshake: bool,
    /// SHUTDOWN and SHUTDOWN_ACK retransmissions before the session gives up and closes.
    max_shutdown_attempts: u16,
    suspend_timeout: Duration,
    flush_data_timeout: Duration,
}

impl Config {
    pub fn congestion_control(&self) -> Option<CongestionControlKind> {
        self.congestion_control
    }

    pub fn transmit_rate_limit(&self) -> u32 {
        self.transmit_rate_limit
    }

    pub fn rate_modulation_initial_threshold(&self) -> u32 {
        self.rate_modulation_initial_threshold
    }

    pub fn min_transmit_rate_limit(&self) -> u32 {
        self.min_transmit_rate_limit
    }

    pub fn loss_adaptive_increase(&self) -> u32 {
        self.loss_adaptive_increase
    }

    pub fn use_two_way_handshake(&self) -> bool {
        self.use_two_way_handshake
    }

    pub fn max_shutdown_attempts(&self) -> u16 {
        self.max_shutdown_attempts
    }

    /// Time to wait in SUSPEND_SENT for the peer's ack. Never shorter than 10ms.
    pub fn suspend_timeout(&self) -> Duration {
        std::cmp::max(self.suspend_timeout, MIN_SUSPEND_TIMEOUT)
    }

    /// Time allowed for queued data to drain before a suspension proceeds. Zero skips the flush.
    pub fn flush_data_timeout(&self) -> Duration {
        self.flush_data_timeout
    }

    pub fn with_congestion_control(mut self, kind: Option<CongestionControlKind>) -> Self {
        self.congestion_control = kind;
        self
    }

    pub fn with_transmit_rate_limit(mut self, bytes_per_sec: u32) -> Self {
        self.transmit_rate_limit = bytes_per_sec;
        self
    }

    pub fn with_rate_modulation_initial_threshold(mut self, bytes_per_sec: u32) -> Self {
        self.rate_modulation_initial_threshold = bytes_per_sec;
        self
    }

    pub fn with_min_transmit_rate_limit(mut self, bytes_per_sec: u32) -> Self {
        self.min_transmit_rate_limit = bytes_per_sec;
        self
    }

    pub fn with_loss_adaptive_increase(mut self, bytes_per_sec: u32) -> Self {
        self.loss_adaptive_increase = bytes_per_sec;
        self
    }

    pub fn with_two_way_handshake(mut self, enabled: bool) -> Self {
        self.use_two_way_handshake = enabled;
        self
    }

    pub fn with_max_shutdown_attempts(mut self, attempts: u16) -> Self {
        self.max_shutdown_attempts = attempts;
        self
    }

    pub fn with_suspend_timeout(mut self, timeout: Duration) -> Self {
        self.suspend_timeout = timeout;
        self
    }

    pub fn with_flush_data_timeout(mut self, timeout: Duration) -> Self {
        self.flush_data_timeout = timeout;
        self
    }

    /// Rejects settings a session cannot run with.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.max_shutdown_attempts == 0 {
            return Err(ProtocolError::InvalidConfiguration(
                "max_shutdown_attempts must be at least 1.",
            ));
        }
        if self.congestion_control.is_some() {
            if self.rate_modulation_initial_threshold == 0 {
                return Err(ProtocolError::InvalidConfiguration(
                    "rate_modulation_initial_threshold must be positive.",
                ));
            }
            if self.min_transmit_rate_limit > self.rate_modulation_initial_threshold {
                return Err(ProtocolError::InvalidConfiguration(
                    "min_transmit_rate_limit is above rate_modulation_initial_threshold.",
                ));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            congestion_control: None,
            transmit_rate_limit: 0,
            rate_modulation_initial_threshold: 5000,
            min_transmit_rate_limit: 1,
            loss_adaptive_increase: 1024,
            use_two_way_handshake: false,
            max_shutdown_attempts: 5,
            suspend_timeout: Duration::from_millis(5000),
            flush_data_timeout: Duration::from_millis(15000),
        }
    }
}
