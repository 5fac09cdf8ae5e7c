use crate::call::{CallCommand, CallNotice, CallObserver, EndReason};
use crate::error::CallError;
use crate::media::{CaptureDevice, MediaTrackManager};
use crate::messaging::{ChatLog, Messenger};
use crate::presence::{PresenceDirectory, PresenceEvent};
use crate::signaling::SignalingOutput;
use crate::transport::{
    AttemptId, ConnectionManager, RemoteTrack, TrackKind, TransportConfig, TransportEvent,
    TransportFactory, TransportState,
};
use duplex_core::{
    Availability, CallState, ChatMessage, PeerId, PeerIdentity, RelayMessage, SdpKind, ShareMode,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// An offer whose description has already been applied, awaiting the
/// user's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOffer {
    pub sdp: String,
    pub caller_id: PeerId,
    pub share_mode: ShareMode,
}

/// Internal call phase. Every phase other than `Waiting` owns exactly one
/// connection, identified by its attempt.
#[derive(Debug, Clone)]
enum CallPhase {
    Waiting,
    Outgoing {
        attempt: AttemptId,
        peer: PeerId,
        share_mode: ShareMode,
    },
    Incoming {
        attempt: AttemptId,
        peer: PeerId,
        share_mode: ShareMode,
        /// Set once the remote description is in place; taken by accept.
        pending: Option<PendingOffer>,
    },
    Active {
        attempt: AttemptId,
        peer: PeerId,
        share_mode: ShareMode,
    },
}

impl CallPhase {
    fn state(&self) -> CallState {
        match self {
            CallPhase::Waiting => CallState::Waiting,
            CallPhase::Outgoing { .. } => CallState::Outgoing,
            CallPhase::Incoming { .. } => CallState::Incoming,
            CallPhase::Active { .. } => CallState::Active,
        }
    }

    fn attempt(&self) -> Option<AttemptId> {
        match self {
            CallPhase::Waiting => None,
            CallPhase::Outgoing { attempt, .. }
            | CallPhase::Incoming { attempt, .. }
            | CallPhase::Active { attempt, .. } => Some(*attempt),
        }
    }

    fn peer(&self) -> Option<&PeerId> {
        match self {
            CallPhase::Waiting => None,
            CallPhase::Outgoing { peer, .. }
            | CallPhase::Incoming { peer, .. }
            | CallPhase::Active { peer, .. } => Some(peer),
        }
    }

    fn share_mode(&self) -> Option<ShareMode> {
        match self {
            CallPhase::Waiting => None,
            CallPhase::Outgoing { share_mode, .. }
            | CallPhase::Incoming { share_mode, .. }
            | CallPhase::Active { share_mode, .. } => Some(*share_mode),
        }
    }
}

struct ControllerState {
    identity: PeerIdentity,
    phase: CallPhase,
    chat_log: ChatLog,
    remote_tracks: Vec<RemoteTrack>,
}

/// The call negotiation state machine.
///
/// Cheap to clone; clones share state. Not `Send`: run it on a `LocalSet`.
/// State is never borrowed across an `.await`, and each operation checks
/// after every suspension that its attempt is still the current one.
#[derive(Clone)]
pub struct CallController {
    inner: Rc<RefCell<ControllerState>>,
    connections: ConnectionManager,
    media: MediaTrackManager,
    presence: PresenceDirectory,
    signaling: Arc<dyn SignalingOutput>,
    observer: Rc<dyn CallObserver>,
}

impl CallController {
    pub fn new(
        identity: PeerIdentity,
        signaling: Arc<dyn SignalingOutput>,
        factory: Arc<dyn TransportFactory>,
        config: TransportConfig,
        capture: Arc<dyn CaptureDevice>,
        observer: Rc<dyn CallObserver>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (connections, transport_rx) = ConnectionManager::new(factory, config);
        let controller = Self {
            inner: Rc::new(RefCell::new(ControllerState {
                identity,
                phase: CallPhase::Waiting,
                chat_log: ChatLog::new(),
                remote_tracks: Vec::new(),
            })),
            connections,
            media: MediaTrackManager::new(capture),
            presence: PresenceDirectory::new(),
            signaling,
            observer,
        };
        (controller, transport_rx)
    }

    pub fn state(&self) -> CallState {
        self.inner.borrow().phase.state()
    }

    pub fn identity(&self) -> PeerIdentity {
        self.inner.borrow().identity.clone()
    }

    /// The other party of the current call, if any.
    pub fn peer(&self) -> Option<PeerId> {
        self.inner.borrow().phase.peer().cloned()
    }

    pub fn share_mode(&self) -> Option<ShareMode> {
        self.inner.borrow().phase.share_mode()
    }

    pub fn pending_offer(&self) -> Option<PendingOffer> {
        match &self.inner.borrow().phase {
            CallPhase::Incoming { pending, .. } => pending.clone(),
            _ => None,
        }
    }

    pub fn chat_log(&self) -> Vec<ChatMessage> {
        self.inner.borrow().chat_log.messages().to_vec()
    }

    pub fn remote_tracks(&self) -> Vec<RemoteTrack> {
        self.inner.borrow().remote_tracks.clone()
    }

    pub fn presence(&self) -> &PresenceDirectory {
        &self.presence
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Runs one user intent.
    pub async fn execute(&self, command: CallCommand) -> Result<(), CallError> {
        match command {
            CallCommand::Place { target, share_mode } => self.place_call(target, share_mode).await,
            CallCommand::Accept => self.accept_call().await,
            CallCommand::Reject => self.reject_call().await,
            CallCommand::HangUp => self.hang_up().await,
            CallCommand::SendChat(body) => self.send_chat(body).await.map(|_| ()),
            CallCommand::ShareScreen => self.share_screen().await,
            CallCommand::Register(name) => {
                self.register(name).await;
                Ok(())
            }
            CallCommand::ClearChat => {
                self.clear_chat();
                Ok(())
            }
        }
    }

    /// Logs the error at its severity and hands it to the observer.
    pub fn report(&self, err: &CallError) {
        match err {
            CallError::Superseded => {
                debug!("{}", err);
                return;
            }
            CallError::RemoteRejected(_) | CallError::RemoteUnavailable(_) => info!("{}", err),
            CallError::InvalidTransition { .. }
            | CallError::ChannelNotOpen
            | CallError::NoVideoSender => warn!("{}", err),
            CallError::NegotiationFailure(source) => error!("Negotiation failed: {:#}", source),
            _ => error!("{}", err),
        }
        self.observer.on_error(err);
    }

    pub async fn place_call(&self, target: PeerId, share_mode: ShareMode) -> Result<(), CallError> {
        let state = self.state();
        if state != CallState::Waiting {
            return Err(CallError::invalid("place_call", state));
        }
        if target == self.identity().id {
            return Err(CallError::precondition("place_call", "cannot call yourself"));
        }
        if !self.presence.is_available(&target) {
            return Err(CallError::precondition(
                "place_call",
                format!("peer {target} is not available"),
            ));
        }
        let Some(attempt) = self.connections.create() else {
            return Err(CallError::precondition(
                "place_call",
                "a connection already exists",
            ));
        };

        info!("Calling {} ({:?}) on {}", target, share_mode, attempt);
        self.enter(CallPhase::Outgoing {
            attempt,
            peer: target.clone(),
            share_mode,
        });
        self.announce_availability().await;

        match self.negotiate_offer(attempt, &target, share_mode).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.abort(attempt, e).await),
        }
    }

    async fn negotiate_offer(
        &self,
        attempt: AttemptId,
        target: &PeerId,
        share_mode: ShareMode,
    ) -> Result<(), CallError> {
        let transport = self.connections.open(attempt).await?;

        let stream = self.media.acquire(share_mode).await?;
        self.connections.set_local_media(attempt, stream.clone())?;
        self.media.attach(&stream, transport.as_ref()).await?;
        self.connections.open_data_channel(attempt).await?;

        let offer = transport.create_offer().await?;
        transport
            .set_local_description(SdpKind::Offer, offer.clone())
            .await?;
        self.ensure_current(attempt)?;

        self.signaling
            .send_offer(target.clone(), offer, share_mode)
            .await;
        info!("Offer sent to {}", target);
        self.flush_local_candidates(attempt).await;
        Ok(())
    }

    /// Applies an inbound offer and waits for the user's decision. An offer
    /// arriving while busy is rejected back to its sender.
    pub async fn receive_offer(
        &self,
        caller: PeerId,
        sdp: String,
        share_mode: ShareMode,
    ) -> Result<(), CallError> {
        let state = self.state();
        if state != CallState::Waiting {
            info!("Busy, rejecting offer from {}", caller);
            self.signaling.send_reject(caller).await;
            return Err(CallError::invalid("receive_offer", state));
        }
        let Some(attempt) = self.connections.create() else {
            return Err(CallError::precondition(
                "receive_offer",
                "a connection already exists",
            ));
        };

        info!("Incoming {:?} call from {} on {}", share_mode, caller, attempt);
        self.enter(CallPhase::Incoming {
            attempt,
            peer: caller.clone(),
            share_mode,
            pending: None,
        });
        self.announce_availability().await;

        let applied = async {
            self.connections.open(attempt).await?;
            self.connections
                .set_remote_description(attempt, SdpKind::Offer, sdp.clone())
                .await
        }
        .await;
        if let Err(e) = applied {
            return Err(self.abort(attempt, e).await);
        }

        let stored = {
            let mut inner = self.inner.borrow_mut();
            match &mut inner.phase {
                CallPhase::Incoming {
                    attempt: current,
                    pending,
                    ..
                } if *current == attempt => {
                    *pending = Some(PendingOffer {
                        sdp,
                        caller_id: caller.clone(),
                        share_mode,
                    });
                    true
                }
                _ => false,
            }
        };
        if !stored {
            return Err(CallError::Superseded);
        }

        self.observer
            .on_notice(&CallNotice::IncomingCall { caller, share_mode });
        Ok(())
    }

    /// Answers the pending offer. The call becomes active once the transport
    /// reports connected.
    pub async fn accept_call(&self) -> Result<(), CallError> {
        let (attempt, offer) = {
            let mut inner = self.inner.borrow_mut();
            match &mut inner.phase {
                CallPhase::Incoming {
                    attempt, pending, ..
                } => match pending.take() {
                    Some(offer) => (*attempt, offer),
                    None => {
                        return Err(CallError::precondition(
                            "accept_call",
                            "no offer is waiting for an answer",
                        ));
                    }
                },
                phase => return Err(CallError::invalid("accept_call", phase.state())),
            }
        };

        info!("Accepting call from {}", offer.caller_id);
        match self.negotiate_answer(attempt, &offer).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.abort(attempt, e).await),
        }
    }

    async fn negotiate_answer(
        &self,
        attempt: AttemptId,
        offer: &PendingOffer,
    ) -> Result<(), CallError> {
        let transport = self.connections.transport(attempt)?;

        let stream = self.media.acquire(offer.share_mode).await?;
        self.connections.set_local_media(attempt, stream.clone())?;
        self.media.attach(&stream, transport.as_ref()).await?;

        let answer = transport.create_answer().await?;
        transport
            .set_local_description(SdpKind::Answer, answer.clone())
            .await?;
        self.ensure_current(attempt)?;

        self.signaling
            .send_answer(offer.caller_id.clone(), answer)
            .await;
        info!("Answer sent to {}", offer.caller_id);
        self.flush_local_candidates(attempt).await;
        Ok(())
    }

    pub async fn reject_call(&self) -> Result<(), CallError> {
        let caller = match &self.inner.borrow().phase {
            CallPhase::Incoming {
                pending: Some(offer),
                ..
            } => offer.caller_id.clone(),
            CallPhase::Incoming { .. } => {
                return Err(CallError::precondition(
                    "reject_call",
                    "no offer is waiting for an answer",
                ));
            }
            phase => return Err(CallError::invalid("reject_call", phase.state())),
        };

        info!("Rejecting call from {}", caller);
        self.end_call(EndReason::Declined).await;
        Ok(())
    }

    pub async fn receive_answer(&self, from: PeerId, sdp: String) -> Result<(), CallError> {
        let (attempt, peer) = match &self.inner.borrow().phase {
            CallPhase::Outgoing { attempt, peer, .. } => (*attempt, peer.clone()),
            phase => return Err(CallError::invalid("receive_answer", phase.state())),
        };
        if from != peer {
            return Err(CallError::precondition(
                "receive_answer",
                format!("answer from {from} while calling {peer}"),
            ));
        }
        if self.connections.remote_description_requested(attempt) {
            return Err(CallError::precondition(
                "receive_answer",
                "answer already applied",
            ));
        }

        match self
            .connections
            .set_remote_description(attempt, SdpKind::Answer, sdp)
            .await
        {
            Ok(()) => {
                debug!("Answer from {} applied", from);
                Ok(())
            }
            Err(e) => Err(self.abort(attempt, e).await),
        }
    }

    /// `connect:reject` from `from`: a refusal while calling them, a
    /// cancellation while they are calling us.
    pub async fn receive_remote_reject(&self, from: PeerId) -> Result<(), CallError> {
        let reason = match &self.inner.borrow().phase {
            CallPhase::Outgoing { peer, .. } if *peer == from => EndReason::RemoteRejected,
            CallPhase::Incoming { peer, .. } if *peer == from => EndReason::Cancelled,
            phase => {
                return Err(CallError::precondition(
                    "receive_remote_reject",
                    format!("no pending call with {from} while {}", phase.state()),
                ));
            }
        };

        info!("Call with {} ended by remote: {:?}", from, reason);
        let refused = reason == EndReason::RemoteRejected;
        self.end_call(reason).await;
        if refused {
            self.report(&CallError::RemoteRejected(from));
        }
        Ok(())
    }

    pub async fn hang_up(&self) -> Result<(), CallError> {
        let state = self.state();
        if state == CallState::Waiting {
            return Err(CallError::invalid("hang_up", state));
        }

        info!("Hanging up from {}", state);
        self.end_call(EndReason::HungUp).await;
        Ok(())
    }

    /// Sends a chat line to the peer and records it locally.
    pub async fn send_chat(&self, body: impl Into<String>) -> Result<ChatMessage, CallError> {
        let message = ChatMessage::new(self.identity().display_name, body);
        Messenger::send(self.connections.data_channel(), &message).await?;
        self.inner.borrow_mut().chat_log.append(message.clone());
        Ok(message)
    }

    pub fn clear_chat(&self) {
        self.inner.borrow_mut().chat_log.clear();
    }

    /// Replaces the outgoing video of an active call with a screen capture.
    pub async fn share_screen(&self) -> Result<(), CallError> {
        let attempt = match &self.inner.borrow().phase {
            CallPhase::Active { attempt, .. } => *attempt,
            phase => return Err(CallError::invalid("share_screen", phase.state())),
        };
        let transport = self.connections.transport(attempt)?;
        if !transport
            .senders()
            .await
            .iter()
            .any(|s| s.kind == Some(TrackKind::Video))
        {
            return Err(CallError::NoVideoSender);
        }

        let track = self.media.acquire_display_track().await?;
        if let Err(e) = self.ensure_current(attempt) {
            track.stop();
            return Err(e);
        }
        if let Err(e) = self
            .media
            .replace_video_track(transport.as_ref(), &track)
            .await
        {
            track.stop();
            return Err(e);
        }

        match self.connections.swap_local_video(attempt, track.clone()) {
            Ok(Some(previous)) => previous.stop(),
            Ok(None) => {}
            Err(e) => {
                track.stop();
                return Err(e);
            }
        }
        info!("Screen share started on {}", attempt);
        Ok(())
    }

    /// Sets the display name and announces it. A rename first withdraws
    /// the old name.
    pub async fn register(&self, name: impl Into<String>) {
        let name = name.into();
        let previous = {
            let mut inner = self.inner.borrow_mut();
            std::mem::replace(&mut inner.identity.display_name, name.clone())
        };
        if !previous.is_empty() && previous != name {
            info!("Renaming '{}' -> '{}'", previous, name);
            self.signaling.announce_deleted(previous).await;
        }
        self.announce_availability().await;
    }

    /// Dispatches one inbound relay message.
    pub async fn handle_signal(&self, msg: RelayMessage) -> Result<(), CallError> {
        debug!("Relay -> {}", msg.event_name());
        match msg {
            RelayMessage::Offer {
                peer_id,
                sdp,
                share_mode,
            } => self.receive_offer(peer_id, sdp, share_mode).await,
            RelayMessage::Answer { peer_id, sdp } => self.receive_answer(peer_id, sdp).await,
            RelayMessage::IceCandidate(candidate) => {
                self.connections.add_remote_candidate(candidate).await;
                Ok(())
            }
            RelayMessage::Reject(peer_id) => self.receive_remote_reject(peer_id).await,
            RelayMessage::Notice(text) => {
                info!("Relay notice: {}", text);
                self.observer.on_notice(&CallNotice::Relay(text));
                Ok(())
            }
            presence => {
                if let Some(event) = PresenceEvent::from_relay(&presence) {
                    self.handle_presence(event).await;
                }
                Ok(())
            }
        }
    }

    async fn handle_presence(&self, event: PresenceEvent) {
        let identity = self.identity();
        let about_self = match &event {
            PresenceEvent::Available(peer) => peer.id == identity.id,
            PresenceEvent::Unavailable(key) => {
                *key == identity.id.0 || *key == identity.display_name
            }
            PresenceEvent::Deleted(name) => *name == identity.display_name,
        };
        if about_self {
            return;
        }

        let departed = match &event {
            PresenceEvent::Deleted(name) => self.presence.find(name).map(|e| e.identity.id),
            _ => None,
        };
        self.presence.apply(event);

        let Some(departed) = departed else {
            return;
        };
        let pending_with_departed = matches!(
            &self.inner.borrow().phase,
            CallPhase::Outgoing { peer, .. } | CallPhase::Incoming { peer, .. } if *peer == departed
        );
        if pending_with_departed {
            info!("Peer {} left before the call connected", departed);
            self.end_call(EndReason::RemoteUnavailable).await;
            self.report(&CallError::RemoteUnavailable(departed));
        }
    }

    /// Dispatches one transport event. Events of a previous attempt are
    /// dropped.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        let attempt = event.attempt();
        if !self.is_current(attempt) {
            debug!("Dropping stale {:?}", event);
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                let sendable = self.connections.hold_local_candidate(attempt, candidate);
                if let Some(candidate) = sendable {
                    debug!("Trickling local candidate on {}", attempt);
                    self.signaling.send_ice(candidate).await;
                }
            }
            TransportEvent::CandidateError(_, err) => {
                warn!("Candidate gathering error on {}: {}", attempt, err);
            }
            TransportEvent::StateChanged(_, state) => {
                self.on_transport_state(attempt, state).await;
            }
            TransportEvent::DataChannelReceived(_, channel) => {
                info!("Remote data channel '{}' on {}", channel.label(), attempt);
                self.connections.adopt_data_channel(attempt, channel).await;
            }
            TransportEvent::ChannelOpen(_, label) => {
                info!("Data channel '{}' open on {}", label, attempt);
            }
            TransportEvent::ChannelMessage(_, data) => match Messenger::decode(&data) {
                Ok(message) => {
                    self.inner.borrow_mut().chat_log.append(message.clone());
                    self.observer.on_chat_message(&message);
                }
                Err(e) => warn!("Dropping chat frame on {}: {:#}", attempt, e),
            },
            TransportEvent::ChannelClosed(_, label) => {
                info!("Data channel '{}' closed on {}", label, attempt);
            }
            TransportEvent::RemoteTrackAdded(_, track) => {
                info!("Remote {:?} track {} on {}", track.kind, track.id, attempt);
                self.inner.borrow_mut().remote_tracks.push(track.clone());
                self.observer.on_remote_track(&track);
            }
        }
    }

    async fn on_transport_state(&self, attempt: AttemptId, state: TransportState) {
        if state == TransportState::Connected {
            self.mark_connected(attempt);
        } else if state.is_terminal() {
            info!("Connection {} {:?}", attempt, state);
            self.end_call(EndReason::Terminated(state)).await;
        } else {
            debug!("Connection {} {:?}", attempt, state);
        }
    }

    fn mark_connected(&self, attempt: AttemptId) {
        let next = match &self.inner.borrow().phase {
            CallPhase::Outgoing {
                attempt: current,
                peer,
                share_mode,
            }
            | CallPhase::Incoming {
                attempt: current,
                peer,
                share_mode,
                pending: None,
            } if *current == attempt => CallPhase::Active {
                attempt,
                peer: peer.clone(),
                share_mode: *share_mode,
            },
            _ => return,
        };

        let peer = next.peer().cloned();
        self.enter(next);
        if let Some(peer) = peer {
            info!("Call with {} connected", peer);
            self.observer.on_notice(&CallNotice::Connected { peer });
        }
    }

    /// Sends the candidates gathered before our description went out, in
    /// gathering order. Later candidates are trickled as they come.
    async fn flush_local_candidates(&self, attempt: AttemptId) {
        while let Some(candidate) = self.connections.release_local_candidate(attempt) {
            debug!("Trickling held candidate on {}", attempt);
            self.signaling.send_ice(candidate).await;
        }
    }

        /// Hangs up whatever call is in progress.
    pub async fn shutdown(&self) {
        if self.state() != CallState::Waiting {
            self.end_call(EndReason::HungUp).await;
        }
    }

    /// Fails the attempt: tears it down unless a concurrent transition has
    /// already replaced it.
    async fn abort(&self, attempt: AttemptId, err: CallError) -> CallError {
        if !self.is_current(attempt) {
            debug!("Attempt {} superseded: {}", attempt, err);
            return CallError::Superseded;
        }

        error!("Call attempt {} failed: {}", attempt, err);
        self.end_call(EndReason::Failed(err.to_string())).await;
        err
    }

    /// Returns to waiting. The connection is released before anything else
    /// is awaited, so no await observes waiting with a live connection.
    async fn end_call(&self, reason: EndReason) {
        let previous = self.enter(CallPhase::Waiting);
        let Some(peer) = previous.peer().cloned() else {
            return;
        };
        self.inner.borrow_mut().remote_tracks.clear();
        self.connections.close().await;

        // Before connecting the transport cannot carry the teardown to the
        // peer, so the relay does.
        let unanswered = matches!(
            previous,
            CallPhase::Outgoing { .. } | CallPhase::Incoming { .. }
        );
        let remote_initiated = matches!(
            reason,
            EndReason::RemoteRejected | EndReason::Cancelled | EndReason::RemoteUnavailable
        );
        if unanswered && !remote_initiated {
            self.signaling.send_reject(peer.clone()).await;
        }

        self.observer.on_notice(&CallNotice::Ended { peer, reason });
        self.announce_availability().await;
    }

    /// Swaps the phase and notifies the observer; returns the old phase.
    fn enter(&self, next: CallPhase) -> CallPhase {
        let (previous, from, to) = {
            let mut inner = self.inner.borrow_mut();
            let from = inner.phase.state();
            let to = next.state();
            (std::mem::replace(&mut inner.phase, next), from, to)
        };
        if from != to {
            info!("Call state {} -> {}", from, to);
            self.observer.on_state_change(from, to);
        }
        previous
    }

    async fn announce_availability(&self) {
        let (identity, availability) = {
            let inner = self.inner.borrow();
            (inner.identity.clone(), inner.phase.state().availability())
        };
        match availability {
            Availability::Available => self.signaling.announce_available(identity).await,
            Availability::Unavailable => self.signaling.announce_unavailable(identity.id).await,
        }
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.inner.borrow().phase.attempt() == Some(attempt)
    }

    fn ensure_current(&self, attempt: AttemptId) -> Result<(), CallError> {
        if self.is_current(attempt) {
            Ok(())
        } else {
            Err(CallError::Superseded)
        }
    }
}
