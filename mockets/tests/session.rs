use mockets::{
    AtomicRateLimit, Config, CongestionControlKind, ConnectionState, ControlChunk, DataPoint,
    SessionController, SharedBandwidthEstimate, SuspendTiebreak, TransmitRateLimiter,
};
use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

fn new_session(config: Config) -> SessionController {
    SessionController::new(
        config,
        Arc::new(SharedBandwidthEstimate::new()),
        Arc::new(AtomicRateLimit::new(0)),
    )
    .unwrap()
}

fn connected_pair() -> (SessionController, SessionController) {
    let client = new_session(Config::default());
    let server = new_session(Config::default());

    assert!(client.connect());
    assert!(server.received(ControlChunk::Init));
    assert!(client.received(ControlChunk::InitAck));
    assert!(server.accept());
    assert!(client.received(ControlChunk::CookieAck));

    assert_eq!(client.state(), ConnectionState::Established);
    assert_eq!(server.state(), ConnectionState::Established);
    (client, server)
}

#[test]
fn connect_suspend_resume_and_close() {
    let (client, server) = connected_pair();

    assert!(client.suspend());
    assert!(client.queue_flushed_or_timeout());
    assert!(server.received(ControlChunk::Suspend));
    assert!(client.received(ControlChunk::SuspendAck));
    assert_eq!(client.state(), ConnectionState::Suspended);
    assert_eq!(server.state(), ConnectionState::SuspendReceived);

    assert!(client.resume());
    assert!(server.received(ControlChunk::Resume));
    assert!(client.received(ControlChunk::ResumeAck));
    assert!(client.can_transmit_data());
    assert!(server.can_transmit_data());

    assert!(client.close());
    assert!(client.outstanding_queue_flushed());
    assert!(server.received(ControlChunk::Shutdown));
    assert_eq!(server.state(), ConnectionState::ShutdownReceived);
    assert!(server.outstanding_queue_flushed());
    assert!(client.received(ControlChunk::ShutdownAck));
    assert!(server.received(ControlChunk::ShutdownComplete));

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(server.state(), ConnectionState::Closed);
}

#[test]
fn simultaneous_shutdown_converges() {
    let (left, right) = connected_pair();
    assert!(left.close());
    assert!(right.close());

    assert!(left.outstanding_queue_flushed());
    // Still draining its own queue, so the peer's SHUTDOWN is dropped and retransmitted later.
    assert!(!right.received(ControlChunk::Shutdown));
    assert!(right.outstanding_queue_flushed());

    assert!(left.received(ControlChunk::Shutdown));
    assert_eq!(left.state(), ConnectionState::ShutdownAckSent);
    assert!(right.received(ControlChunk::ShutdownAck));
    assert!(left.received(ControlChunk::ShutdownComplete));

    assert_eq!(left.state(), ConnectionState::Closed);
    assert_eq!(right.state(), ConnectionState::Closed);
}

#[test]
fn simultaneous_suspend_is_resolved_by_the_tiebreak() {
    let (client, server) = connected_pair();
    let client_addr = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 10), 4000);
    let server_addr = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 4000);
    client.set_suspend_tiebreak(SuspendTiebreak {
        outgoing_validation: 77,
        incoming_validation: 77,
        local: client_addr,
        remote: server_addr,
    });
    server.set_suspend_tiebreak(SuspendTiebreak {
        outgoing_validation: 77,
        incoming_validation: 77,
        local: server_addr,
        remote: client_addr,
    });

    for session in &[&client, &server] {
        assert!(session.suspend());
        assert!(session.queue_flushed_or_timeout());
    }

    assert!(client.received(ControlChunk::Suspend));
    assert!(!server.received(ControlChunk::Suspend));
    assert!(server.received(ControlChunk::SuspendAck));

    assert_eq!(client.state(), ConnectionState::SuspendReceived);
    assert_eq!(server.state(), ConnectionState::Suspended);
}

#[test]
fn abort_wins_from_any_thread() {
    let (client, _server) = connected_pair();
    let client = Arc::new(client);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                if i == 0 {
                    client.abort()
                } else {
                    client.close()
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.abort());
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn sender_threads_never_see_a_limit_below_the_floor() {
    let estimate = Arc::new(SharedBandwidthEstimate::new());
    let limit = Arc::new(AtomicRateLimit::new(0));
    let config = Config::default()
        .with_congestion_control(Some(CongestionControlKind::RateModulation))
        .with_rate_modulation_initial_threshold(10_000)
        .with_min_transmit_rate_limit(2_000);
    let session =
        Arc::new(SessionController::new(config, estimate.clone(), limit.clone()).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let senders: Vec<_> = (0..3)
        .map(|_| {
            let limit = Arc::clone(&limit);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    assert!(limit.transmit_rate_limit() >= 2_000);
                    thread::yield_now();
                }
            })
        })
        .collect();

    for round in 0..500i64 {
        estimate.publish(if round % 2 == 0 { 20_000 + round } else { round });
        session.on_maintenance_tick();
    }
    done.store(true, Ordering::Release);
    for sender in senders {
        sender.join().unwrap();
    }

    assert_eq!(session.metrics().get_count(DataPoint::RateUpdates), 500);
    assert!(limit.transmit_rate_limit() >= 2_000);
}

#[test]
fn suspended_session_moves_between_processes() {
    let estimate = Arc::new(SharedBandwidthEstimate::new());
    let config = Config::default()
        .with_congestion_control(Some(CongestionControlKind::LossAdaptive))
        .with_rate_modulation_initial_threshold(40_000);
    let original =
        SessionController::new(config, estimate, Arc::new(AtomicRateLimit::new(0))).unwrap();
    assert!(original.accept());
    original.report_losses(0, 2);
    assert!(original.suspend());
    assert!(original.queue_flushed_or_timeout());
    assert!(original.received(ControlChunk::SuspendAck));

    let frozen = original.freeze().unwrap();
    let limit = Arc::new(AtomicRateLimit::new(0));
    let restored = SessionController::resume_from_snapshot(
        Config::default(),
        &frozen,
        Arc::new(SharedBandwidthEstimate::new()),
        limit.clone(),
    )
    .unwrap();

    assert_eq!(restored.congestion_control().name(), "CongestionController");
    assert_eq!(limit.transmit_rate_limit(), 20_000);
    assert!(restored.resume());
    assert!(restored.received(ControlChunk::ResumeAck));
    assert!(restored.can_transmit_data());
}
