use duplex_client::{CallError, SenderId, TrackKind};
use duplex_core::{CallState, ShareMode};

use crate::integration::{TestPeer, connect, init_tracing};
use crate::utils::TransportCall;

#[tokio::test]
async fn test_share_screen_swaps_the_video_sender() {
    init_tracing();

    let mut a = TestPeer::new("a", "A");
    let mut b = TestPeer::new("b", "B");
    connect(&mut a, &mut b, ShareMode::WithCamera).await;

    let camera = a
        .capture
        .issued()
        .into_iter()
        .find(|t| t.kind == TrackKind::Video)
        .unwrap();
    assert!(camera.is_live());

    a.controller.share_screen().await.expect("share_screen failed");

    let calls = a.transport().calls();
    assert!(calls.contains(&TransportCall::ReplaceTrack(
        SenderId("sender-1".to_owned()),
        TrackKind::Video
    )));
    // No renegotiation.
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, TransportCall::CreateOffer))
            .count(),
        1
    );
    assert!(!camera.is_live());
    assert_eq!(a.controller.state(), CallState::Active);

    let local = a.controller.connections().local_media().unwrap();
    let video: Vec<_> = local.video_tracks().collect();
    assert_eq!(video.len(), 1);
    assert_eq!(video[0].label, "mock Video");
    assert_ne!(video[0].id, camera.id);
}

#[tokio::test]
async fn test_share_screen_needs_a_video_sender() {
    init_tracing();

    let mut a = TestPeer::new("a", "A");
    let mut b = TestPeer::new("b", "B");
    connect(&mut a, &mut b, ShareMode::AudioOnly).await;
    let issued = a.capture.issued().len();

    let err = a.controller.share_screen().await.unwrap_err();

    assert!(matches!(err, CallError::NoVideoSender));
    assert_eq!(a.capture.issued().len(), issued);
    assert_eq!(a.controller.state(), CallState::Active);
}

#[tokio::test]
async fn test_share_screen_outside_a_call_is_invalid() {
    let a = TestPeer::new("a", "A");
    let err = a.controller.share_screen().await.unwrap_err();
    assert!(matches!(err, CallError::InvalidTransition { .. }));
}
