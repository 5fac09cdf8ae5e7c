use duplex_client::{CallError, EndReason};
use duplex_core::{CallState, RelayMessage, ShareMode};

use crate::integration::{TestPeer, init_tracing, ring};

#[tokio::test]
async fn test_denied_capture_aborts_the_call() {
    init_tracing();

    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    a.sees(&b);
    a.capture.deny();

    let err = a
        .controller
        .place_call(b.id(), ShareMode::WithCamera)
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::MediaUnavailable(_)));
    assert_eq!(a.controller.state(), CallState::Waiting);
    assert!(a.signaling.offers_to(&b.id()).await.is_empty());
    assert!(!a.controller.connections().exists());
    assert!(a.transport().is_closed());
    assert!(matches!(a.observer.ended_with(), Some(EndReason::Failed(_))));
    assert_eq!(
        a.signaling.last_presence().await,
        Some(RelayMessage::UserAvailable(a.controller.identity()))
    );
}

#[tokio::test]
async fn test_callee_without_media_rejects() {
    init_tracing();

    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    ring(&a, &b, ShareMode::AudioOnly).await;
    b.capture.deny();

    let err = b.controller.accept_call().await.unwrap_err();

    assert!(matches!(err, CallError::MediaUnavailable(_)));
    assert_eq!(b.controller.state(), CallState::Waiting);
    assert!(b.signaling.answers_to(&a.id()).await.is_empty());
    assert_eq!(b.signaling.rejects_to(&a.id()).await, 1);
}
