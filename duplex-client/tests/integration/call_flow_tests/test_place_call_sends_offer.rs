use duplex_core::{CallState, PeerId, RelayMessage, SdpKind, ShareMode};

use duplex_client::TrackKind;

use crate::integration::{TestPeer, init_tracing};
use crate::utils::TransportCall;

#[tokio::test]
async fn test_place_call_sends_offer() {
    init_tracing();

    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    a.sees(&b);

    a.controller
        .place_call(b.id(), ShareMode::AudioOnly)
        .await
        .expect("place_call failed");

    assert_eq!(a.controller.state(), CallState::Outgoing);
    assert_eq!(a.controller.peer(), Some(PeerId::from("b")));

    let offers = a.signaling.offers_to(&b.id()).await;
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].1, ShareMode::AudioOnly);

    // Media, chat channel and local description all precede the offer.
    assert_eq!(
        a.transport().calls(),
        vec![
            TransportCall::AddTrack(TrackKind::Audio),
            TransportCall::CreateDataChannel("messages".to_owned()),
            TransportCall::CreateOffer,
            TransportCall::SetLocalDescription(SdpKind::Offer),
        ]
    );

    // Leaving WAITING is announced before the offer goes out.
    let signals = a.signaling.signals().await;
    assert_eq!(signals[0], RelayMessage::UserUnavailable("a".to_owned()));
    assert!(matches!(signals[1], RelayMessage::Offer { .. }));
}

#[tokio::test]
async fn test_camera_call_attaches_audio_and_video() {
    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    a.sees(&b);

    a.controller
        .place_call(b.id(), ShareMode::WithCamera)
        .await
        .unwrap();

    let tracks: Vec<_> = a
        .transport()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            TransportCall::AddTrack(kind) => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(tracks, vec![TrackKind::Audio, TrackKind::Video]);
}
