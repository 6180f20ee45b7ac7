mod config;
mod congestion;
mod errors;
mod metrics;
mod session;
mod snapshot;
mod state;
mod state_machine;
mod telemetry;

pub use crate::{
    config::Config,
    congestion::{
        CongestionControl, CongestionControlKind, LossAdaptivePolicy, NoCongestionControl,
        RateModulationPolicy,
    },
    errors::{ProtocolError, ProtocolResult},
    metrics::{DataPoint, Metrics},
    session::{ControlChunk, SessionController, SessionListener, SuspendTiebreak},
    snapshot::{SessionSnapshot, SNAPSHOT_LEN},
    state::{ConnectionState, Event, SuspendPrecedence, Transition},
    state_machine::ConnectionStateMachine,
    telemetry::{AtomicRateLimit, BandwidthEstimator, SharedBandwidthEstimate, TransmitRateLimiter},
};
