//! Session control for Mockets, a message transport over UDP.
//!
//! A session is driven by a [`SessionController`]: application requests (`connect`, `close`,
//! `suspend`, `resume`), control chunks from the peer and timer expiries all become transitions of
//! one [`ConnectionStateMachine`]. The transmit rate limit the sender obeys is owned by a
//! [`TransmitRateLimiter`] and recomputed by the configured [`CongestionControl`] strategy.
//!
//! ```
//! use mockets::{AtomicRateLimit, Config, CongestionControlKind, SessionController,
//!               SharedBandwidthEstimate, TransmitRateLimiter};
//! use std::sync::Arc;
//!
//! let estimate = Arc::new(SharedBandwidthEstimate::new());
//! let limit = Arc::new(AtomicRateLimit::new(0));
//! let config = Config::default()
//!     .with_congestion_control(Some(CongestionControlKind::RateModulation));
//! let session = SessionController::new(config, estimate.clone(), limit.clone()).unwrap();
//!
//! assert!(session.connect());
//! assert_eq!(session.state_as_str(), "COOKIE_WAIT");
//! assert_eq!(limit.transmit_rate_limit(), 5000);
//! ```

pub use mockets_protocol::*;
