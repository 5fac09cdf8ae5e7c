use std::rc::Rc;
use std::sync::Arc;

use duplex_client::{CallCommand, CallController, CallSession, TransportConfig, TransportState};
use duplex_core::{CallState, PeerIdentity, RelayMessage, SdpKind, ShareMode};
use tokio::sync::mpsc;
use tokio::task::LocalSet;

use crate::integration::{init_tracing, wait_until};
use crate::utils::{
    MockCapture, MockSignalingOutput, MockTransportFactory, RecordingObserver, TransportCall,
};

#[tokio::test]
async fn test_session_runs_an_incoming_call() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let signaling = MockSignalingOutput::new_stored_only();
            let factory = MockTransportFactory::new();
            let (controller, transport_rx) = CallController::new(
                PeerIdentity::new("b", "B"),
                Arc::new(signaling.clone()),
                factory.clone(),
                TransportConfig::default(),
                Arc::new(MockCapture::default()),
                Rc::new(RecordingObserver::default()),
            );
            let (command_tx, command_rx) = mpsc::channel(16);
            let (relay_tx, relay_rx) = mpsc::channel(16);
            let session = CallSession::new(controller.clone(), command_rx, relay_rx, transport_rx);
            let session_task = tokio::task::spawn_local(session.run());

            relay_tx
                .send(RelayMessage::UserNew(PeerIdentity::new("a", "A")))
                .await
                .unwrap();
            relay_tx
                .send(RelayMessage::Offer {
                    peer_id: "a".into(),
                    sdp: "v=0 offer".to_owned(),
                    share_mode: ShareMode::AudioOnly,
                })
                .await
                .unwrap();

            assert!(wait_until(|| controller.pending_offer().is_some(), 2000).await);
            assert!(controller.presence().get(&"a".into()).is_some());

            command_tx.send(CallCommand::Accept).await.unwrap();
            assert!(
                wait_until(|| controller.pending_offer().is_none(), 2000).await,
                "accept not processed"
            );
            assert!(
                wait_until(
                    || factory
                        .last()
                        .calls()
                        .contains(&TransportCall::SetLocalDescription(SdpKind::Answer)),
                    2000
                )
                .await
            );

            factory.last().emit_state(TransportState::Connected);
            assert!(wait_until(|| controller.state() == CallState::Active, 2000).await);
            assert_eq!(signaling.answers_to(&"a".into()).await.len(), 1);

            // Closing the command channel ends the session and the call.
            drop(command_tx);
            session_task.await.unwrap();
            assert_eq!(controller.state(), CallState::Waiting);
            assert!(factory.last().is_closed());
        })
        .await;
}
