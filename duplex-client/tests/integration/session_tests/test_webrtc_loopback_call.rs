use std::rc::Rc;
use std::sync::Arc;

use duplex_client::{
    CallCommand, CallController, CallSession, TransportConfig, WebRtcTransportFactory,
};
use duplex_core::{CallState, PeerId, PeerIdentity, RelayMessage, ShareMode};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, LocalSet};

use crate::integration::{init_tracing, wait_until};
use crate::utils::{MockCapture, MockSignalingOutput, RecordingObserver, relay_link};

struct Client {
    controller: CallController,
    commands: mpsc::Sender<CallCommand>,
    session: JoinHandle<()>,
}

/// Wires two clients with real negotiation engines through an in-memory
/// relay.
fn start_pair() -> (Client, Client) {
    // Host candidates only.
    let config = TransportConfig {
        ice_servers: vec![],
        ..Default::default()
    };

    let (a_signaling, a_out) = MockSignalingOutput::new();
    let (b_signaling, b_out) = MockSignalingOutput::new();
    let (a_relay_tx, a_relay_rx) = mpsc::channel::<RelayMessage>(64);
    let (b_relay_tx, b_relay_rx) = mpsc::channel::<RelayMessage>(64);
    relay_link(PeerId::from("a"), a_out, b_relay_tx);
    relay_link(PeerId::from("b"), b_out, a_relay_tx);

    let mut clients = Vec::new();
    for (id, name, signaling, relay_rx) in [
        ("a", "A", a_signaling, a_relay_rx),
        ("b", "B", b_signaling, b_relay_rx),
    ] {
        let (controller, transport_rx) = CallController::new(
            PeerIdentity::new(id, name),
            Arc::new(signaling),
            Arc::new(WebRtcTransportFactory),
            config.clone(),
            Arc::new(MockCapture::default()),
            Rc::new(RecordingObserver::default()),
        );
        let (commands, command_rx) = mpsc::channel(16);
        let session = CallSession::new(controller.clone(), command_rx, relay_rx, transport_rx);
        clients.push(Client {
            controller,
            commands,
            session: tokio::task::spawn_local(session.run()),
        });
    }

    let b = clients.pop().unwrap();
    let a = clients.pop().unwrap();
    (a, b)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webrtc_loopback_call() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let (a, b) = start_pair();

            b.commands
                .send(CallCommand::Register("B".to_owned()))
                .await
                .unwrap();
            assert!(
                wait_until(|| a.controller.presence().is_available(&"b".into()), 2000).await,
                "A never saw B"
            );

            a.commands
                .send(CallCommand::Place {
                    target: "b".into(),
                    share_mode: ShareMode::AudioOnly,
                })
                .await
                .unwrap();
            assert!(
                wait_until(|| b.controller.pending_offer().is_some(), 5000).await,
                "B never received the offer"
            );

            b.commands.send(CallCommand::Accept).await.unwrap();
            assert!(
                wait_until(
                    || a.controller.state() == CallState::Active
                        && b.controller.state() == CallState::Active,
                    10000
                )
                .await,
                "call never connected"
            );

            assert!(
                wait_until(
                    || a.controller
                        .connections()
                        .data_channel()
                        .is_some_and(|c| c.is_open()),
                    5000
                )
                .await,
                "chat channel never opened"
            );
            a.commands
                .send(CallCommand::SendChat("hello".to_owned()))
                .await
                .unwrap();
            assert!(
                wait_until(|| b.controller.chat_log().len() == 1, 5000).await,
                "B never got the chat line"
            );

            let log = b.controller.chat_log();
            assert_eq!(log[0].sender_name, "A");
            assert_eq!(log[0].body, "hello");

            a.commands.send(CallCommand::HangUp).await.unwrap();
            assert!(
                wait_until(|| a.controller.state() == CallState::Waiting, 2000).await
            );

            // B only learns of the hangup from its own transport going away.
            assert!(
                wait_until(|| b.controller.state() == CallState::Waiting, 15000).await,
                "B never tore down after A hung up"
            );
            assert!(!b.controller.connections().exists());

            drop(a.commands);
            drop(b.commands);
            a.session.await.unwrap();
            b.session.await.unwrap();
        })
        .await;
}
