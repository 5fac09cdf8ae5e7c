use duplex_client::{EndReason, TransportState};
use duplex_core::{CallState, ShareMode};

use crate::integration::{TestPeer, connect, init_tracing};

#[tokio::test]
async fn test_disconnected_failed_and_closed_all_tear_down() {
    init_tracing();

    for state in [
        TransportState::Disconnected,
        TransportState::Failed,
        TransportState::Closed,
    ] {
        let mut a = TestPeer::new("a", "A");
        let mut b = TestPeer::new("b", "B");
        connect(&mut a, &mut b, ShareMode::AudioOnly).await;
        let transport = a.transport();

        transport.emit_state(state);
        a.pump().await;

        assert_eq!(a.controller.state(), CallState::Waiting, "{state:?}");
        assert!(transport.is_closed(), "{state:?}");
        assert!(!a.controller.connections().exists(), "{state:?}");
        assert_eq!(a.observer.ended_with(), Some(EndReason::Terminated(state)));
    }
}

#[tokio::test]
async fn test_events_of_a_previous_attempt_are_dropped() {
    init_tracing();

    let mut a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    a.sees(&b);

    a.controller
        .place_call(b.id(), ShareMode::AudioOnly)
        .await
        .unwrap();
    let first = a.transport();
    first.emit_candidate("candidate:old");

    a.controller.hang_up().await.unwrap();
    a.controller
        .place_call(b.id(), ShareMode::AudioOnly)
        .await
        .unwrap();
    let second = a.transport();
    assert!(!std::sync::Arc::ptr_eq(&first, &second));

    // Queued before teardown, delivered after the recall.
    a.pump().await;
    assert!(a.signaling.ice_candidates().await.is_empty());

    // The old transport is unbound and cannot reach the controller.
    assert!(!first.emit_state(TransportState::Failed));
    a.pump().await;
    assert_eq!(a.controller.state(), CallState::Outgoing);
}
