use crate::state::{ConnectionState, Event, SuspendPrecedence, Transition};
use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe owner of a connection's state.
///
/// Every transition takes the lock, checks the precondition, writes the new state and releases
/// the lock before returning. A rejected transition returns `false` and leaves the state alone.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: Mutex<ConnectionState>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Closed),
        }
    }

    /// Applies `event` atomically, returning the accepted transition.
    pub fn apply(&self, event: Event) -> Option<Transition> {
        let mut state = self.lock();
        Self::transition(&mut state, event)
    }

    /// Like `apply`, but only when the current state is one of `expected`. The check and the
    /// transition happen under the same lock.
    pub fn apply_from(&self, expected: &[ConnectionState], event: Event) -> Option<Transition> {
        let mut state = self.lock();
        if !expected.contains(&*state) {
            debug!("Skipped {:?}: state {} is not one of {:?}", event, *state, expected);
            return None;
        }
        Self::transition(&mut state, event)
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.lock()
    }

    /// Diagnostic only.
    pub fn current_state_as_str(&self) -> &'static str {
        self.current_state().as_str()
    }

    /// Forces CLOSED regardless of the current state. Used at teardown. The forced change is
    /// reported as an abort; `None` means the state was already CLOSED.
    pub fn set_closed(&self) -> Option<Transition> {
        let mut state = self.lock();
        let from = *state;
        if from == ConnectionState::Closed {
            return None;
        }
        *state = ConnectionState::Closed;
        drop(state);

        debug!("{} -> {} (forced)", from, ConnectionState::Closed);
        Some(Transition {
            event: Event::Abort,
            from,
            to: ConnectionState::Closed,
        })
    }

    pub fn associate(&self) -> bool {
        self.fire(Event::Associate)
    }

    pub fn received_init_ack(&self) -> bool {
        self.fire(Event::ReceivedInitAck)
    }

    pub fn received_cookie_ack(&self) -> bool {
        self.fire(Event::ReceivedCookieAck)
    }

    pub fn received_cookie_echo(&self) -> bool {
        self.fire(Event::ReceivedCookieEcho)
    }

    pub fn received_init(&self) -> bool {
        self.fire(Event::ReceivedInit)
    }

    pub fn simple_connect(&self) -> bool {
        self.fire(Event::SimpleConnect)
    }

    pub fn received_simple_connect_ack(&self) -> bool {
        self.fire(Event::ReceivedSimpleConnectAck)
    }

    pub fn shutdown(&self) -> bool {
        self.fire(Event::Shutdown)
    }

    /// Moves SHUTDOWN_PENDING to SHUTDOWN_SENT, or SHUTDOWN_RECEIVED to SHUTDOWN_ACK_SENT.
    pub fn outstanding_queue_flushed(&self) -> bool {
        self.fire(Event::OutstandingQueueFlushed)
    }

    pub fn received_shutdown(&self) -> bool {
        self.fire(Event::ReceivedShutdown)
    }

    pub fn received_shutdown_ack(&self) -> bool {
        self.fire(Event::ReceivedShutdownAck)
    }

    pub fn received_shutdown_complete(&self) -> bool {
        self.fire(Event::ReceivedShutdownComplete)
    }

    pub fn suspend(&self) -> bool {
        self.fire(Event::Suspend)
    }

    pub fn queue_flushed_or_timeout(&self) -> bool {
        self.fire(Event::QueueFlushedOrTimeout)
    }

    /// Handles a peer's suspend request. While our own suspend is outstanding (SUSPEND_SENT) the
    /// request is only honoured when `precedence` is `Remote`.
    pub fn received_suspend(&self, precedence: SuspendPrecedence) -> bool {
        self.fire(Event::ReceivedSuspend(precedence))
    }

    pub fn received_suspend_ack(&self) -> bool {
        self.fire(Event::ReceivedSuspendAck)
    }

    /// Rehydrates a frozen session: CLOSED -> SUSPENDED.
    pub fn resume_from_suspension(&self) -> bool {
        self.fire(Event::ResumeFromSuspension)
    }

    pub fn resume(&self) -> bool {
        self.fire(Event::Resume)
    }

    pub fn received_resume(&self) -> bool {
        self.fire(Event::ReceivedResume)
    }

    pub fn received_resume_ack(&self) -> bool {
        self.fire(Event::ReceivedResumeAck)
    }

    pub fn suspend_timeout_expired(&self) -> bool {
        self.fire(Event::SuspendTimeoutExpired)
    }

    pub fn abort(&self) -> bool {
        self.fire(Event::Abort)
    }

    pub fn application_abort(&self) -> bool {
        self.fire(Event::ApplicationAbort)
    }

    fn transition(state: &mut MutexGuard<ConnectionState>, event: Event) -> Option<Transition> {
        let from = **state;
        let to = match from.on(event) {
            Some(to) => to,
            None => {
                debug!("Rejected {:?} in state {}", event, from);
                return None;
            }
        };
        **state = to;

        debug!("{} -> {} on {:?}", from, to, event);
        Some(Transition { event, from, to })
    }

    #[inline]
    fn fire(&self, event: Event) -> bool {
        self.apply(event).is_some()
    }

    // The guarded value is a plain `Copy` enum, so a poisoned lock still holds a valid state.
    fn lock(&self) -> MutexGuard<ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
