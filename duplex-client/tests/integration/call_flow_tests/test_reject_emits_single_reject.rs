use duplex_client::EndReason;
use duplex_core::{CallState, RelayMessage, ShareMode};

use crate::integration::{TestPeer, init_tracing, ring};

#[tokio::test]
async fn test_reject_emits_single_reject() {
    init_tracing();

    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    ring(&a, &b, ShareMode::AudioOnly).await;
    let transport = b.transport();

    b.controller.reject_call().await.expect("reject_call failed");

    assert_eq!(b.controller.state(), CallState::Waiting);
    assert!(b.controller.pending_offer().is_none());
    assert_eq!(b.signaling.rejects_to(&a.id()).await, 1);
    assert!(b.signaling.answers_to(&a.id()).await.is_empty());
    assert!(transport.is_closed());
    assert!(!b.controller.connections().exists());
    assert_eq!(b.observer.ended_with(), Some(EndReason::Declined));
    assert_eq!(
        b.signaling.last_presence().await,
        Some(RelayMessage::UserAvailable(b.controller.identity()))
    );

    // Nothing left to reject.
    assert!(b.controller.reject_call().await.is_err());
    assert_eq!(b.signaling.rejects_to(&a.id()).await, 1);
}
