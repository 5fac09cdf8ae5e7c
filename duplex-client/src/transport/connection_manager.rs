use crate::error::CallError;
use crate::media::{MediaStream, MediaTrack};
use crate::transport::{
    AttemptId, DataChannel, PeerTransport, RemoteTrack, TransportConfig, TransportEvent,
    TransportFactory, TransportHandler, TransportState,
};
use bytes::Bytes;
use duplex_core::{IceCandidate, SdpKind};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Binds a transport's callbacks to the controller's event queue, tagging
/// every event with the attempt the transport belongs to.
struct EventForwarder {
    attempt: AttemptId,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl EventForwarder {
    fn forward(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("Controller gone, dropping transport event for {}", self.attempt);
        }
    }
}

impl TransportHandler for EventForwarder {
    fn on_ice_candidate(&self, candidate: IceCandidate) {
        self.forward(TransportEvent::CandidateGenerated(self.attempt, candidate));
    }

    fn on_ice_candidate_error(&self, error: String) {
        self.forward(TransportEvent::CandidateError(self.attempt, error));
    }

    fn on_connection_state_change(&self, state: TransportState) {
        self.forward(TransportEvent::StateChanged(self.attempt, state));
    }

    fn on_data_channel(&self, channel: Arc<dyn DataChannel>) {
        self.forward(TransportEvent::DataChannelReceived(self.attempt, channel));
    }

    fn on_channel_open(&self, label: String) {
        self.forward(TransportEvent::ChannelOpen(self.attempt, label));
    }

    fn on_channel_message(&self, data: Bytes) {
        self.forward(TransportEvent::ChannelMessage(self.attempt, data));
    }

    fn on_channel_close(&self, label: String) {
        self.forward(TransportEvent::ChannelClosed(self.attempt, label));
    }

    fn on_remote_track(&self, track: RemoteTrack) {
        self.forward(TransportEvent::RemoteTrackAdded(self.attempt, track));
    }
}

struct Connection {
    attempt: AttemptId,
    /// Empty until the factory has produced the transport.
    transport: Option<Arc<dyn PeerTransport>>,
    data_channel: Option<Arc<dyn DataChannel>>,
    local_media: Option<MediaStream>,
    pending_candidates: VecDeque<IceCandidate>,
    /// Claimed before the description is handed to the transport, so a
    /// second description cannot start while the first is being applied.
    remote_description_requested: bool,
    /// Remote description set and the backlog drained; new candidates go
    /// straight to the transport.
    accepting_candidates: bool,
    /// Local candidates gathered before our description reached the peer.
    outbound_candidates: VecDeque<IceCandidate>,
    trickle_open: bool,
}

#[derive(Default)]
struct ManagerState {
    next_attempt: u64,
    slot: Option<Connection>,
}

/// Owns zero or one connection together with its data channel, local media
/// and the queue of remote candidates that arrived too early.
///
/// State is only touched between suspension points; every async method
/// re-checks that the attempt it was called for still owns the slot after
/// each `.await`.
#[derive(Clone)]
pub struct ConnectionManager {
    factory: Arc<dyn TransportFactory>,
    config: TransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: Rc<RefCell<ManagerState>>,
}

impl ConnectionManager {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        config: TransportConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            factory,
            config,
            events,
            state: Rc::new(RefCell::new(ManagerState::default())),
        };
        (manager, events_rx)
    }

    /// Reserves the slot for a new call attempt. No-op while a connection
    /// already exists.
    pub fn create(&self) -> Option<AttemptId> {
        let mut state = self.state.borrow_mut();
        if let Some(existing) = &state.slot {
            warn!(
                "Connection {} already exists, refusing to create another",
                existing.attempt
            );
            return None;
        }

        state.next_attempt += 1;
        let attempt = AttemptId(state.next_attempt);
        state.slot = Some(Connection {
            attempt,
            transport: None,
            data_channel: None,
            local_media: None,
            pending_candidates: VecDeque::new(),
            remote_description_requested: false,
            accepting_candidates: false,
            outbound_candidates: VecDeque::new(),
            trickle_open: false,
        });
        debug!("Reserved connection {}", attempt);
        Some(attempt)
    }

    /// Builds the transport for a reserved attempt and binds its handler.
    pub async fn open(&self, attempt: AttemptId) -> Result<Arc<dyn PeerTransport>, CallError> {
        self.ensure_owner(attempt)?;

        let transport = self
            .factory
            .create(&self.config)
            .await
            .map_err(CallError::NegotiationFailure)?;

        let installed = {
            let mut state = self.state.borrow_mut();
            match state.slot.as_mut() {
                Some(conn) if conn.attempt == attempt && conn.transport.is_none() => {
                    transport.bind(Arc::new(EventForwarder {
                        attempt,
                        events: self.events.clone(),
                    }));
                    conn.transport = Some(transport.clone());
                    true
                }
                _ => false,
            }
        };

        if !installed {
            debug!("Connection {} torn down while opening", attempt);
            let _ = transport.close().await;
            return Err(CallError::Superseded);
        }

        info!("Connection {} open", attempt);
        Ok(transport)
    }

    pub fn exists(&self) -> bool {
        self.state.borrow().slot.is_some()
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.state.borrow().slot.as_ref().map(|conn| conn.attempt)
    }

    pub fn transport(&self, attempt: AttemptId) -> Result<Arc<dyn PeerTransport>, CallError> {
        let state = self.state.borrow();
        state
            .slot
            .as_ref()
            .filter(|conn| conn.attempt == attempt)
            .and_then(|conn| conn.transport.clone())
            .ok_or(CallError::Superseded)
    }

    /// Keeps the local capture so teardown can stop it. A stale attempt gets
    /// its stream stopped immediately.
    pub fn set_local_media(&self, attempt: AttemptId, stream: MediaStream) -> Result<(), CallError> {
        let mut state = self.state.borrow_mut();
        match state.slot.as_mut() {
            Some(conn) if conn.attempt == attempt => {
                if let Some(previous) = conn.local_media.replace(stream) {
                    previous.stop();
                }
                Ok(())
            }
            _ => {
                stream.stop();
                Err(CallError::Superseded)
            }
        }
    }

    pub fn local_media(&self) -> Option<MediaStream> {
        let state = self.state.borrow();
        state.slot.as_ref().and_then(|conn| conn.local_media.clone())
    }

    /// Records `track` as the local video, returning the track it displaced.
    pub fn swap_local_video(
        &self,
        attempt: AttemptId,
        track: MediaTrack,
    ) -> Result<Option<MediaTrack>, CallError> {
        let mut state = self.state.borrow_mut();
        let conn = state
            .slot
            .as_mut()
            .filter(|conn| conn.attempt == attempt)
            .ok_or(CallError::Superseded)?;
        match conn.local_media.as_mut() {
            Some(stream) => Ok(stream.swap_video_track(track)),
            None => {
                conn.local_media = Some(MediaStream::new(vec![track]));
                Ok(None)
            }
        }
    }

    /// Creates the chat channel on the caller's side.
    pub async fn open_data_channel(&self, attempt: AttemptId) -> Result<(), CallError> {
        let transport = self.transport(attempt)?;
        let channel = transport
            .create_data_channel(&self.config.chat_label)
            .await
            .map_err(CallError::NegotiationFailure)?;

        if self.store_data_channel(attempt, channel.clone()) {
            Ok(())
        } else {
            let _ = channel.close().await;
            Err(CallError::Superseded)
        }
    }

    /// Takes over the channel the remote side opened.
    pub async fn adopt_data_channel(&self, attempt: AttemptId, channel: Arc<dyn DataChannel>) {
        if !self.store_data_channel(attempt, channel.clone()) {
            debug!("Closing data channel '{}' of stale connection", channel.label());
            let _ = channel.close().await;
        }
    }

    fn store_data_channel(&self, attempt: AttemptId, channel: Arc<dyn DataChannel>) -> bool {
        let mut state = self.state.borrow_mut();
        match state.slot.as_mut() {
            Some(conn) if conn.attempt == attempt => {
                if conn.data_channel.is_some() {
                    warn!("Connection {} already has a data channel", attempt);
                    return false;
                }
                conn.data_channel = Some(channel);
                true
            }
            _ => false,
        }
    }

    pub fn data_channel(&self) -> Option<Arc<dyn DataChannel>> {
        let state = self.state.borrow();
        state.slot.as_ref().and_then(|conn| conn.data_channel.clone())
    }

    /// Whether a remote description was applied, or is being applied, on
    /// this attempt.
    pub fn remote_description_requested(&self, attempt: AttemptId) -> bool {
        let state = self.state.borrow();
        state
            .slot
            .as_ref()
            .is_some_and(|conn| conn.attempt == attempt && conn.remote_description_requested)
    }

    pub fn pending_candidates(&self) -> usize {
        let state = self.state.borrow();
        state
            .slot
            .as_ref()
            .map_or(0, |conn| conn.pending_candidates.len())
    }

    /// Applies the remote description, then replays queued candidates in
    /// the order they were received.
    pub async fn set_remote_description(
        &self,
        attempt: AttemptId,
        kind: SdpKind,
        sdp: String,
    ) -> Result<(), CallError> {
        let transport = {
            let mut state = self.state.borrow_mut();
            let conn = state
                .slot
                .as_mut()
                .filter(|conn| conn.attempt == attempt)
                .ok_or(CallError::Superseded)?;
            let transport = conn.transport.clone().ok_or(CallError::Superseded)?;
            if conn.remote_description_requested {
                return Err(CallError::precondition(
                    "set_remote_description",
                    "remote description already applied",
                ));
            }
            conn.remote_description_requested = true;
            transport
        };

        transport
            .set_remote_description(kind, sdp)
            .await
            .map_err(CallError::NegotiationFailure)?;
        self.ensure_owner(attempt)?;
        debug!("Remote {:?} set on connection {}", kind, attempt);

        self.drain_candidates(attempt, transport).await;
        Ok(())
    }

    async fn drain_candidates(&self, attempt: AttemptId, transport: Arc<dyn PeerTransport>) {
        let mut applied = 0usize;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let Some(conn) = state.slot.as_mut().filter(|conn| conn.attempt == attempt) else {
                    return;
                };
                match conn.pending_candidates.pop_front() {
                    Some(candidate) => candidate,
                    None => {
                        conn.accepting_candidates = true;
                        break;
                    }
                }
            };

            if let Err(e) = transport.add_ice_candidate(next).await {
                warn!("Ignoring queued candidate on {}: {:#}", attempt, e);
            }
            applied += 1;
        }

        if applied > 0 {
            debug!("Replayed {} queued candidate(s) on {}", applied, attempt);
        }
    }

    /// Queues the candidate until the remote description is in place,
    /// otherwise applies it. Rejections are logged and ignored.
    pub async fn add_remote_candidate(&self, candidate: IceCandidate) {
        let (attempt, transport) = {
            let mut state = self.state.borrow_mut();
            let Some(conn) = state.slot.as_mut() else {
                debug!("No connection, dropping late candidate");
                return;
            };
            match (&conn.transport, conn.accepting_candidates) {
                (Some(transport), true) => (conn.attempt, transport.clone()),
                _ => {
                    conn.pending_candidates.push_back(candidate);
                    debug!(
                        "Queued remote candidate on {} ({} pending)",
                        conn.attempt,
                        conn.pending_candidates.len()
                    );
                    return;
                }
            }
        };

        if let Err(e) = transport.add_ice_candidate(candidate).await {
            warn!("Ignoring remote candidate on {}: {:#}", attempt, e);
        }
    }

    /// Holds a local candidate until our description has been sent to the
    /// peer. Returns the candidate when it may be trickled right away.
    pub fn hold_local_candidate(
        &self,
        attempt: AttemptId,
        candidate: IceCandidate,
    ) -> Option<IceCandidate> {
        let mut state = self.state.borrow_mut();
        let conn = state.slot.as_mut().filter(|conn| conn.attempt == attempt)?;
        if conn.trickle_open {
            return Some(candidate);
        }
        conn.outbound_candidates.push_back(candidate);
        debug!(
            "Holding local candidate on {} ({} held)",
            attempt,
            conn.outbound_candidates.len()
        );
        None
    }

    /// Pops the oldest held local candidate. Once none are left, new
    /// candidates are no longer held.
    pub fn release_local_candidate(&self, attempt: AttemptId) -> Option<IceCandidate> {
        let mut state = self.state.borrow_mut();
        let conn = state.slot.as_mut().filter(|conn| conn.attempt == attempt)?;
        let next = conn.outbound_candidates.pop_front();
        if next.is_none() {
            conn.trickle_open = true;
        }
        next
    }

    /// Tears the connection down. Handlers are unbound first so nothing
    /// fires into a half-closed connection. Safe to call repeatedly.
    pub async fn close(&self) {
        let Some(conn) = self.state.borrow_mut().slot.take() else {
            debug!("close: no connection");
            return;
        };
        info!("Closing connection {}", conn.attempt);

        if let Some(transport) = &conn.transport {
            transport.unbind();
        }
        if let Some(stream) = &conn.local_media {
            stream.stop();
        }
        if let Some(channel) = &conn.data_channel {
            if let Err(e) = channel.close().await {
                debug!("Data channel close on {}: {:#}", conn.attempt, e);
            }
        }
        if let Some(transport) = &conn.transport {
            if let Err(e) = transport.close().await {
                warn!("Transport close on {}: {:#}", conn.attempt, e);
            }
        }
        if !conn.pending_candidates.is_empty() {
            debug!(
                "Discarded {} unapplied candidate(s) of {}",
                conn.pending_candidates.len(),
                conn.attempt
            );
        }
    }

    fn ensure_owner(&self, attempt: AttemptId) -> Result<(), CallError> {
        match self.current_attempt() {
            Some(current) if current == attempt => Ok(()),
            _ => Err(CallError::Superseded),
        }
    }
}
