//! Connection states and the transition table that links them.
//!
//! Everything in here is plain data. Locking lives in `state_machine`.

use std::fmt;

/// States a mocket connection can be in. `Closed` is both the initial state and, together with
/// `ApplicationAbort`, a terminal one.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Closed = 0,
    CookieWait = 1,
    CookieEchoed = 2,
    Established = 3,
    ShutdownPending = 4,
    ShutdownSent = 5,
    ShutdownReceived = 6,
    ShutdownAckSent = 7,
    SuspendPending = 8,
    SuspendSent = 9,
    Suspended = 10,
    SuspendReceived = 11,
    ResumeSent = 12,
    SimpleConnectAckWait = 13,
    ApplicationAbort = 14,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 15] = [
        ConnectionState::Closed,
        ConnectionState::CookieWait,
        ConnectionState::CookieEchoed,
        ConnectionState::Established,
        ConnectionState::ShutdownPending,
        ConnectionState::ShutdownSent,
        ConnectionState::ShutdownReceived,
        ConnectionState::ShutdownAckSent,
        ConnectionState::SuspendPending,
        ConnectionState::SuspendSent,
        ConnectionState::Suspended,
        ConnectionState::SuspendReceived,
        ConnectionState::ResumeSent,
        ConnectionState::SimpleConnectAckWait,
        ConnectionState::ApplicationAbort,
    ];

    pub fn from_u8(val: u8) -> Option<Self> {
        ConnectionState::ALL.get(val as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Closed => "CLOSED",
            ConnectionState::CookieWait => "COOKIE_WAIT",
            ConnectionState::CookieEchoed => "COOKIE_ECHOED",
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::ShutdownPending => "SHUTDOWN_PENDING",
            ConnectionState::ShutdownSent => "SHUTDOWN_SENT",
            ConnectionState::ShutdownReceived => "SHUTDOWN_RECEIVED",
            ConnectionState::ShutdownAckSent => "SHUTDOWN_ACK_SENT",
            ConnectionState::SuspendPending => "SUSPEND_PENDING",
            ConnectionState::SuspendSent => "SUSPEND_SENT",
            ConnectionState::Suspended => "SUSPENDED",
            ConnectionState::SuspendReceived => "SUSPEND_RECEIVED",
            ConnectionState::ResumeSent => "RESUME_SENT",
            ConnectionState::SimpleConnectAckWait => "SIMPLE_CONNECT_ACK_WAIT",
            ConnectionState::ApplicationAbort => "APPLICATION_ABORT",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed || self == ConnectionState::ApplicationAbort
    }

    /// Returns the state `event` leads to from `self`, or `None` when the event is not legal here.
    pub fn on(self, event: Event) -> Option<ConnectionState> {
        use self::ConnectionState as S;

        let next = match (self, event) {
            (_, Event::Abort) => S::Closed,
            (_, Event::ApplicationAbort) => S::ApplicationAbort,

            // Connection establishment
            (S::Closed, Event::Associate) => S::CookieWait,
            (S::CookieWait, Event::ReceivedInitAck) => S::CookieEchoed,
            (S::CookieEchoed, Event::ReceivedCookieAck) => S::Established,
            (S::Closed, Event::ReceivedCookieEcho) => S::Established,
            (S::Closed, Event::ReceivedInit) => S::Closed,
            (S::Closed, Event::SimpleConnect) => S::SimpleConnectAckWait,
            (S::SimpleConnectAckWait, Event::ReceivedSimpleConnectAck)
            | (S::Established, Event::ReceivedSimpleConnectAck) => S::Established,

            // Graceful shutdown
            (S::Established, Event::Shutdown) => S::ShutdownPending,
            (S::ShutdownPending, Event::OutstandingQueueFlushed) => S::ShutdownSent,
            (S::ShutdownReceived, Event::OutstandingQueueFlushed) => S::ShutdownAckSent,
            (S::Established, Event::ReceivedShutdown)
            | (S::SuspendPending, Event::ReceivedShutdown)
            | (S::SuspendSent, Event::ReceivedShutdown)
            | (S::ResumeSent, Event::ReceivedShutdown) => S::ShutdownReceived,
            (S::ShutdownSent, Event::ReceivedShutdown) => S::ShutdownAckSent,
            (S::ShutdownSent, Event::ReceivedShutdownAck)
            | (S::ShutdownAckSent, Event::ReceivedShutdownAck) => S::Closed,
            (S::ShutdownAckSent, Event::ReceivedShutdownComplete) => S::Closed,

            // Suspension
            (S::Established, Event::Suspend) => S::SuspendPending,
            (S::SuspendPending, Event::QueueFlushedOrTimeout) => S::SuspendSent,
            (S::Established, Event::ReceivedSuspend(_))
            | (S::SuspendPending, Event::ReceivedSuspend(_))
            | (S::SuspendReceived, Event::ReceivedSuspend(_)) => S::SuspendReceived,
            // Both sides suspended at once: only the side that loses the tiebreak gives way.
            (S::SuspendSent, Event::ReceivedSuspend(SuspendPrecedence::Remote)) => {
                S::SuspendReceived
            }
            (S::SuspendSent, Event::ReceivedSuspendAck) => S::Suspended,
            (S::SuspendSent, Event::SuspendTimeoutExpired) => S::Established,

            // Resumption
            (S::Closed, Event::ResumeFromSuspension) => S::Suspended,
            (S::Suspended, Event::Resume) | (S::ResumeSent, Event::Resume) => S::ResumeSent,
            (S::Established, Event::ReceivedResume)
            | (S::SuspendReceived, Event::ReceivedResume) => S::Established,
            (S::Established, Event::ReceivedResumeAck)
            | (S::ResumeSent, Event::ReceivedResumeAck) => S::Established,

            _ => return None,
        };
        Some(next)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side keeps suspending when both peers send a suspend request at the same time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SuspendPrecedence {
    /// The local suspension wins; the peer's request is ignored.
    Local,
    /// The peer's suspension wins; the local node gets suspended.
    Remote,
    /// Both sides look identical. Neither gives way and the local suspend timer decides.
    Unresolvable,
}

/// Everything that can move a connection from one state to another.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    Associate,
    ReceivedInitAck,
    ReceivedCookieAck,
    ReceivedCookieEcho,
    ReceivedInit,
    SimpleConnect,
    ReceivedSimpleConnectAck,
    Shutdown,
    OutstandingQueueFlushed,
    ReceivedShutdown,
    ReceivedShutdownAck,
    ReceivedShutdownComplete,
    Suspend,
    QueueFlushedOrTimeout,
    ReceivedSuspend(SuspendPrecedence),
    ReceivedSuspendAck,
    ResumeFromSuspension,
    Resume,
    ReceivedResume,
    ReceivedResumeAck,
    SuspendTimeoutExpired,
    Abort,
    ApplicationAbort,
}

impl Event {
    pub const ALL: [Event; 25] = [
        Event::Associate,
        Event::ReceivedInitAck,
        Event::ReceivedCookieAck,
        Event::ReceivedCookieEcho,
        Event::ReceivedInit,
        Event::SimpleConnect,
        Event::ReceivedSimpleConnectAck,
        Event::Shutdown,
        Event::OutstandingQueueFlushed,
        Event::ReceivedShutdown,
        Event::ReceivedShutdownAck,
        Event::ReceivedShutdownComplete,
        Event::Suspend,
        Event::QueueFlushedOrTimeout,
        Event::ReceivedSuspend(SuspendPrecedence::Local),
        Event::ReceivedSuspend(SuspendPrecedence::Remote),
        Event::ReceivedSuspend(SuspendPrecedence::Unresolvable),
        Event::ReceivedSuspendAck,
        Event::ResumeFromSuspension,
        Event::Resume,
        Event::ReceivedResume,
        Event::ReceivedResumeAck,
        Event::SuspendTimeoutExpired,
        Event::Abort,
        Event::ApplicationAbort,
    ];
}

/// An accepted state change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub event: Event,
    pub from: ConnectionState,
    pub to: ConnectionState,
}
