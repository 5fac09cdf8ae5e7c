pub mod session_tests;

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use duplex_client::{CallController, TransportConfig, TransportEvent, TransportState};
use duplex_core::{PeerId, PeerIdentity, ShareMode};

use crate::utils::{
    MockCapture, MockDataChannel, MockSignalingOutput, MockTransport, MockTransportFactory,
    RecordingObserver,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or `timeout_ms` elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool, timeout_ms: u64) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A controller wired to mocks, with its transport events pumped by hand.
pub struct TestPeer {
    pub controller: CallController,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    pub signaling: MockSignalingOutput,
    pub factory: Arc<MockTransportFactory>,
    pub capture: Arc<MockCapture>,
    pub observer: Rc<RecordingObserver>,
}

impl TestPeer {
    pub fn new(id: &str, name: &str) -> Self {
        let signaling = MockSignalingOutput::new_stored_only();
        let factory = MockTransportFactory::new();
        let capture = Arc::new(MockCapture::default());
        let observer = Rc::new(RecordingObserver::default());

        let (controller, events) = CallController::new(
            PeerIdentity::new(id, name),
            Arc::new(signaling.clone()),
            factory.clone(),
            TransportConfig::default(),
            capture.clone(),
            observer.clone(),
        );

        Self {
            controller,
            events,
            signaling,
            factory,
            capture,
            observer,
        }
    }

    pub fn id(&self) -> PeerId {
        self.controller.identity().id
    }

    /// Marks `other` as available in this peer's directory.
    pub fn sees(&self, other: &TestPeer) {
        self.controller
            .presence()
            .upsert_available(other.controller.identity());
    }

    /// The transport of the most recent call attempt.
    pub fn transport(&self) -> Arc<MockTransport> {
        self.factory.last()
    }

    /// Feeds every queued transport event to the controller.
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.controller.handle_transport_event(event).await;
            handled += 1;
        }
        handled
    }
}

/// `a` calls `b`; returns once `b` holds the pending offer.
pub async fn ring(a: &TestPeer, b: &TestPeer, share_mode: ShareMode) {
    a.sees(b);
    a.controller
        .place_call(b.id(), share_mode)
        .await
        .expect("place_call failed");

    let (sdp, mode) = a
        .signaling
        .offers_to(&b.id())
        .await
        .pop()
        .expect("no offer sent");
    b.controller
        .receive_offer(a.id(), sdp, mode)
        .await
        .expect("receive_offer failed");
}

/// Full handshake: both sides ACTIVE with an open chat channel.
pub async fn connect(a: &mut TestPeer, b: &mut TestPeer, share_mode: ShareMode) {
    ring(a, b, share_mode).await;

    b.controller.accept_call().await.expect("accept_call failed");
    let answer = b
        .signaling
        .answers_to(&a.id())
        .await
        .pop()
        .expect("no answer sent");
    a.controller
        .receive_answer(b.id(), answer)
        .await
        .expect("receive_answer failed");

    let a_transport = a.transport();
    let b_transport = b.transport();

    a_transport
        .data_channel()
        .expect("caller created no data channel")
        .set_open(true);
    let b_channel = MockDataChannel::new("messages");
    b_channel.set_open(true);
    b_transport.emit_data_channel(b_channel);

    a_transport.emit_state(TransportState::Connected);
    b_transport.emit_state(TransportState::Connected);
    a.pump().await;
    b.pump().await;
}
