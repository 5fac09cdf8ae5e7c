use duplex_client::CallError;
use duplex_core::{CallState, SdpKind, ShareMode};
use tokio::task::LocalSet;

use crate::integration::{TestPeer, init_tracing};

#[tokio::test]
async fn test_second_answer_during_apply_is_ignored() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let a = TestPeer::new("a", "A");
            let b = TestPeer::new("b", "B");
            a.sees(&b);
            a.controller
                .place_call(b.id(), ShareMode::AudioOnly)
                .await
                .unwrap();
            let transport = a.transport();

            let gate = transport.hold("set_remote_description");
            let controller = a.controller.clone();
            let first = tokio::task::spawn_local(async move {
                controller
                    .receive_answer("b".into(), "v=0 one".to_owned())
                    .await
            });
            gate.wait_reached().await;

            let second = a
                .controller
                .receive_answer("b".into(), "v=0 two".to_owned())
                .await;
            assert!(matches!(second, Err(CallError::InvalidTransition { .. })));

            gate.release();
            first.await.unwrap().unwrap();

            assert_eq!(
                transport.remote_descriptions(),
                vec![(SdpKind::Answer, "v=0 one".to_owned())]
            );
            assert_eq!(a.controller.state(), CallState::Outgoing);
            assert!(!transport.is_closed());
            assert!(a.observer.ended_with().is_none());
        })
        .await;
}

#[tokio::test]
async fn test_answer_after_apply_is_ignored() {
    init_tracing();

    let a = TestPeer::new("a", "A");
    let b = TestPeer::new("b", "B");
    a.sees(&b);
    a.controller
        .place_call(b.id(), ShareMode::AudioOnly)
        .await
        .unwrap();

    a.controller
        .receive_answer("b".into(), "v=0 one".to_owned())
        .await
        .unwrap();
    let again = a
        .controller
        .receive_answer("b".into(), "v=0 one".to_owned())
        .await;

    assert!(matches!(again, Err(CallError::InvalidTransition { .. })));
    assert_eq!(a.transport().remote_descriptions().len(), 1);
    assert_eq!(a.controller.state(), CallState::Outgoing);
}
