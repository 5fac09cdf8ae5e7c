use duplex_core::{PeerIdentity, RelayMessage, ShareMode};

use crate::integration::{TestPeer, init_tracing, ring};

#[tokio::test]
async fn test_rename_withdraws_old_name_first() {
    init_tracing();

    let a = TestPeer::new("a", "A");

    a.controller.register("A").await;
    a.controller.register("Alice").await;

    assert_eq!(
        a.signaling.signals().await,
        vec![
            RelayMessage::UserAvailable(PeerIdentity::new("a", "A")),
            RelayMessage::UserDeleted("A".to_owned()),
            RelayMessage::UserAvailable(PeerIdentity::new("a", "Alice")),
        ]
    );
    assert_eq!(a.controller.identity().display_name, "Alice");
}

#[tokio::test]
async fn test_register_during_call_stays_unavailable() {
    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    ring(&a, &b, ShareMode::AudioOnly).await;

    b.controller.register("Bob").await;

    assert_eq!(
        b.signaling.last_presence().await,
        Some(RelayMessage::UserUnavailable("b".to_owned()))
    );
}
