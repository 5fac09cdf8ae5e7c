use duplex_client::CallNotice;
use duplex_core::{CallState, PeerId, RelayMessage, SdpKind, ShareMode};

use crate::integration::{TestPeer, init_tracing};

#[tokio::test]
async fn test_receive_offer_applies_remote_description() {
    init_tracing();

    let b = TestPeer::new("b", "B");

    b.controller
        .receive_offer("a".into(), "v=0 offer".to_owned(), ShareMode::WithCamera)
        .await
        .expect("receive_offer failed");

    assert_eq!(b.controller.state(), CallState::Incoming);

    let pending = b.controller.pending_offer().expect("no pending offer");
    assert_eq!(pending.caller_id, PeerId::from("a"));
    assert_eq!(pending.share_mode, ShareMode::WithCamera);
    assert_eq!(pending.sdp, "v=0 offer");

    // Applied before the user decides.
    assert_eq!(
        b.transport().remote_descriptions(),
        vec![(SdpKind::Offer, "v=0 offer".to_owned())]
    );
    assert!(b.signaling.answers_to(&"a".into()).await.is_empty());

    assert!(b.observer.has_notice(&CallNotice::IncomingCall {
        caller: "a".into(),
        share_mode: ShareMode::WithCamera,
    }));
    assert_eq!(
        b.signaling.last_presence().await,
        Some(RelayMessage::UserUnavailable("b".to_owned()))
    );
}
