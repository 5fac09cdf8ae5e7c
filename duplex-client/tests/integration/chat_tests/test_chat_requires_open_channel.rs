use duplex_client::CallError;
use duplex_core::ShareMode;

use crate::integration::{TestPeer, init_tracing, ring};

#[tokio::test]
async fn test_chat_before_channel_open_fails() {
    init_tracing();

    let a = TestPeer::new("a", "A");
    let err = a.controller.send_chat("anyone?").await.unwrap_err();
    assert!(matches!(err, CallError::ChannelNotOpen));

    // Channel exists but is still connecting.
    let b = TestPeer::new("b", "B");
    ring(&a, &b, ShareMode::AudioOnly).await;
    let err = a.controller.send_chat("too early").await.unwrap_err();
    assert!(matches!(err, CallError::ChannelNotOpen));

    assert!(a.controller.chat_log().is_empty());
    assert!(a.transport().data_channel().unwrap().sent().is_empty());
}
