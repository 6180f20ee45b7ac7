use crate::{
    config::Config,
    congestion::{CongestionControl, CongestionControlKind, NoCongestionControl},
    errors::{ProtocolError, ProtocolResult},
    metrics::{DataPoint, Metrics},
    snapshot::SessionSnapshot,
    state::{ConnectionState, Event, SuspendPrecedence, Transition},
    state_machine::ConnectionStateMachine,
    telemetry::{BandwidthEstimator, TransmitRateLimiter},
};
use bytes::Bytes;
use log::{debug, warn};
use std::{
    cmp::Ordering as CmpOrdering,
    net::SocketAddrV4,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, PoisonError,
    },
};

/// Control chunks delivered by the receive path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlChunk {
    Init,
    InitAck,
    CookieEcho,
    CookieAck,
    SimpleConnectAck,
    Shutdown,
    ShutdownAck,
    ShutdownComplete,
    Suspend,
    SuspendAck,
    Resume,
    ResumeAck,
}

/// Identity of both ends of a session, used to pick a winner when both peers suspend at once.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SuspendTiebreak {
    pub outgoing_validation: u32,
    pub incoming_validation: u32,
    pub local: SocketAddrV4,
    pub remote: SocketAddrV4,
}

impl SuspendTiebreak {
    pub fn precedence(&self) -> SuspendPrecedence {
        let order = self
            .outgoing_validation
            .cmp(&self.incoming_validation)
            .then_with(|| u32::from(*self.local.ip()).cmp(&u32::from(*self.remote.ip())))
            .then_with(|| self.local.port().cmp(&self.remote.port()));
        match order {
            CmpOrdering::Greater => SuspendPrecedence::Local,
            CmpOrdering::Less => SuspendPrecedence::Remote,
            CmpOrdering::Equal => SuspendPrecedence::Unresolvable,
        }
    }
}

/// Hook for the transport around the session: called after every accepted transition, outside
/// of any lock. Typical reactions are waking the transmitter or resending an ack.
pub trait SessionListener: Send + Sync {
    fn on_transition(&self, transition: Transition);
}

/// Drives one session: maps application requests, peer control chunks and timer expiries onto
/// the connection state machine and runs the congestion-control strategy.
pub struct SessionController {
    config: Config,
    state: ConnectionStateMachine,
    congestion: Box<dyn CongestionControl>,
    limiter: Arc<dyn TransmitRateLimiter>,
    tiebreak: Mutex<Option<SuspendTiebreak>>,
    shutdown_attempts: AtomicU32,
    listener: Option<Arc<dyn SessionListener>>,
    metrics: Metrics,
}

impl SessionController {
    pub fn new(
        config: Config,
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> ProtocolResult<Self> {
        config.validate()?;

        limiter.set_transmit_rate_limit(config.transmit_rate_limit());
        let congestion = match config.congestion_control() {
            Some(kind) => kind.build(&config, estimator, Arc::clone(&limiter))?,
            None => Box::new(NoCongestionControl),
        };
        debug!(
            "New session using {} congestion control, rate limit {} B/s",
            congestion.name(),
            limiter.transmit_rate_limit()
        );

        Ok(Self::assemble(config, congestion, limiter))
    }

    /// Rehydrates a session frozen with `freeze`. The new session starts SUSPENDED and is
    /// resumed with `resume`.
    pub fn resume_from_snapshot(
        config: Config,
        snapshot: &[u8],
        estimator: Arc<dyn BandwidthEstimator>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> ProtocolResult<Self> {
        let snapshot = SessionSnapshot::decode(snapshot)?;
        let config = config.with_congestion_control(snapshot.congestion_control);
        config.validate()?;

        limiter.set_transmit_rate_limit(snapshot.transmit_rate_limit);
        let congestion = match snapshot.congestion_control {
            Some(kind) => kind.resume(
                &config,
                estimator,
                Arc::clone(&limiter),
                snapshot.initialization_phase,
            )?,
            None => Box::new(NoCongestionControl),
        };

        let session = Self::assemble(config, congestion, limiter);
        if !session.drive(Event::ResumeFromSuspension) {
            return Err(ProtocolError::InvalidState(session.state()));
        }
        Ok(session)
    }

    fn assemble(
        config: Config,
        congestion: Box<dyn CongestionControl>,
        limiter: Arc<dyn TransmitRateLimiter>,
    ) -> Self {
        Self {
            config,
            state: ConnectionStateMachine::new(),
            congestion,
            limiter,
            tiebreak: Mutex::new(None),
            shutdown_attempts: AtomicU32::new(0),
            listener: None,
            metrics: Metrics::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn state(&self) -> ConnectionState {
        self.state.current_state()
    }

    pub fn state_as_str(&self) -> &'static str {
        self.state.current_state_as_str()
    }

    pub fn state_machine(&self) -> &ConnectionStateMachine {
        &self.state
    }

    /// Data may only flow on an established connection.
    pub fn can_transmit_data(&self) -> bool {
        self.state() == ConnectionState::Established
    }

    pub fn set_suspend_tiebreak(&self, tiebreak: SuspendTiebreak) {
        *self
            .tiebreak
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tiebreak);
    }

    // Application requests

    /// Active open, using the simple connect exchange when a two-way handshake is configured.
    pub fn connect(&self) -> bool {
        if self.config.use_two_way_handshake() {
            self.drive(Event::SimpleConnect)
        } else {
            self.drive(Event::Associate)
        }
    }

    /// Passive open: the server side has validated the peer's cookie echo.
    pub fn accept(&self) -> bool {
        self.drive(Event::ReceivedCookieEcho)
    }

    /// Graceful close. A session whose peer has suspended it cannot shut down cooperatively and
    /// is aborted instead.
    pub fn close(&self) -> bool {
        match self.state() {
            ConnectionState::Closed => true,
            ConnectionState::Established => self.drive(Event::Shutdown),
            ConnectionState::SuspendReceived => {
                debug!("Closing while suspended by the peer, aborting");
                self.settle(
                    self.state
                        .apply_from(&[ConnectionState::SuspendReceived], Event::Abort),
                )
            }
            state => {
                debug!("Cannot close a session in state {}", state);
                false
            }
        }
    }

    pub fn suspend(&self) -> bool {
        self.drive(Event::Suspend)
    }

    pub fn resume(&self) -> bool {
        self.drive(Event::Resume)
    }

    pub fn abort(&self) -> bool {
        self.drive(Event::Abort)
    }

    pub fn application_abort(&self) -> bool {
        self.drive(Event::ApplicationAbort)
    }

    // Receive path

    /// Applies a control chunk from the peer. A `false` return is usually a duplicate or a race
    /// with a local request and can be ignored.
    pub fn received(&self, chunk: ControlChunk) -> bool {
        let event = match chunk {
            ControlChunk::Init => Event::ReceivedInit,
            ControlChunk::InitAck => Event::ReceivedInitAck,
            ControlChunk::CookieEcho => Event::ReceivedCookieEcho,
            ControlChunk::CookieAck => Event::ReceivedCookieAck,
            ControlChunk::SimpleConnectAck => Event::ReceivedSimpleConnectAck,
            ControlChunk::Shutdown => Event::ReceivedShutdown,
            ControlChunk::ShutdownAck => Event::ReceivedShutdownAck,
            ControlChunk::ShutdownComplete => Event::ReceivedShutdownComplete,
            ControlChunk::Suspend => Event::ReceivedSuspend(self.suspend_precedence()),
            ControlChunk::SuspendAck => Event::ReceivedSuspendAck,
            ControlChunk::Resume => Event::ReceivedResume,
            ControlChunk::ResumeAck => Event::ReceivedResumeAck,
        };
        self.drive(event)
    }

    // Queue-drain detector and timers

    pub fn outstanding_queue_flushed(&self) -> bool {
        self.drive(Event::OutstandingQueueFlushed)
    }

    pub fn queue_flushed_or_timeout(&self) -> bool {
        self.drive(Event::QueueFlushedOrTimeout)
    }

    pub fn suspend_timeout_expired(&self) -> bool {
        self.drive(Event::SuspendTimeoutExpired)
    }

    /// Asks to send one more SHUTDOWN or SHUTDOWN_ACK. Returns `true` while fewer than
    /// `max_shutdown_attempts` have gone out. The call after the last allowed send forces a session
    /// still waiting in SHUTDOWN_SENT or SHUTDOWN_ACK_SENT to CLOSED, and returns `false`.
    pub fn record_shutdown_transmission(&self) -> bool {
        let max_attempts = u32::from(self.config.max_shutdown_attempts());
        let sent = self
            .shutdown_attempts
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |sent| {
                if sent < max_attempts {
                    Some(sent + 1)
                } else {
                    None
                }
            });
        if sent.is_ok() {
            self.metrics.increment(DataPoint::ShutdownsSent);
            return true;
        }

        let forced = self.state.apply_from(
            &[
                ConnectionState::ShutdownSent,
                ConnectionState::ShutdownAckSent,
            ],
            Event::Abort,
        );
        if let Some(transition) = forced {
            warn!(
                "No answer after {} shutdown attempts in state {}, closing",
                max_attempts, transition.from
            );
            self.settle(Some(transition));
        }
        false
    }

    // Congestion control

    /// Periodic maintenance: lets the strategy recompute the transmit rate limit.
    pub fn on_maintenance_tick(&self) {
        let before = self.limiter.transmit_rate_limit();
        self.congestion.update();
        let after = self.limiter.transmit_rate_limit();

        self.metrics.increment(DataPoint::RateUpdates);
        if after > before {
            self.metrics.increment(DataPoint::RateIncreases);
        } else if after < before {
            self.metrics.increment(DataPoint::RateDecreases);
        }
    }

    /// Reports the outcome of a retransmission pass. Packets that timed out repeatedly take
    /// priority over first-time timeouts.
    pub fn report_losses(&self, first_timeouts: u32, repeated_timeouts: u32) {
        let loss_code = if repeated_timeouts > 0 {
            0
        } else if first_timeouts > 0 {
            first_timeouts
        } else {
            return;
        };

        self.metrics.increment(DataPoint::LossReports);
        let before = self.limiter.transmit_rate_limit();
        self.congestion.react_to_losses(loss_code);
        if self.limiter.transmit_rate_limit() < before {
            self.metrics.increment(DataPoint::RateDecreases);
        }
    }

    pub fn usable_space(&self, space_available: u32) -> u32 {
        self.congestion.adapt_to_congestion_window(space_available)
    }

    pub fn transmit_rate_limit(&self) -> u32 {
        self.limiter.transmit_rate_limit()
    }

    pub fn congestion_control(&self) -> &dyn CongestionControl {
        self.congestion.as_ref()
    }

    // Suspension snapshots

    /// Freezes a SUSPENDED session.
    pub fn freeze(&self) -> ProtocolResult<Bytes> {
        let state = self.state();
        if state != ConnectionState::Suspended {
            return Err(ProtocolError::InvalidState(state));
        }

        let snapshot = SessionSnapshot {
            congestion_control: self.config.congestion_control(),
            transmit_rate_limit: self.limiter.transmit_rate_limit(),
            initialization_phase: self.congestion.initialization_phase(),
        };
        Ok(snapshot.encode())
    }

    fn suspend_precedence(&self) -> SuspendPrecedence {
        let tiebreak = *self
            .tiebreak
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let precedence = tiebreak
            .map(|tiebreak| tiebreak.precedence())
            .unwrap_or(SuspendPrecedence::Unresolvable);
        if precedence == SuspendPrecedence::Unresolvable
            && self.state() == ConnectionState::SuspendSent
        {
            warn!(
                "Simultaneous suspension that cannot be resolved, waiting for the suspend timeout"
            );
        }
        precedence
    }

    fn drive(&self, event: Event) -> bool {
        self.settle(self.state.apply(event))
    }

    // Counts the outcome and tells the listener about an accepted transition.
    fn settle(&self, transition: Option<Transition>) -> bool {
        let transition = match transition {
            Some(transition) => transition,
            None => {
                self.metrics.increment(DataPoint::TransitionsRejected);
                return false;
            }
        };
        self.metrics.increment(DataPoint::TransitionsAccepted);

        if transition.from != transition.to
            && (transition.to == ConnectionState::ShutdownSent
                || transition.to == ConnectionState::ShutdownAckSent)
        {
            self.shutdown_attempts.store(0, Ordering::Release);
        }

        if let Some(listener) = &self.listener {
            listener.on_transition(transition);
        }
        true
    }
}
