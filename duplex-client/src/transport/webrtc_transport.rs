use crate::media::MediaTrack;
use crate::transport::{
    DataChannel, IcePolicy, PeerTransport, RemoteTrack, SenderId, SenderInfo, TrackKind,
    TransportConfig, TransportFactory, TransportHandler, TransportState,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use duplex_core::{IceCandidate, SdpKind};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Handler currently bound to a transport; empty once unbound, which turns
/// every registered engine callback into a no-op.
#[derive(Clone, Default)]
struct HandlerSlot(Arc<RwLock<Option<Arc<dyn TransportHandler>>>>);

impl HandlerSlot {
    fn get(&self) -> Option<Arc<dyn TransportHandler>> {
        self.0.read().ok().and_then(|slot| slot.clone())
    }

    fn set(&self, handler: Option<Arc<dyn TransportHandler>>) {
        if let Ok(mut slot) = self.0.write() {
            *slot = handler;
        }
    }
}

struct BoundSender {
    id: SenderId,
    kind: TrackKind,
    sender: Arc<RTCRtpSender>,
}

/// [`PeerTransport`] backed by a webrtc-rs `RTCPeerConnection`.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    handler: HandlerSlot,
    senders: Mutex<Vec<BoundSender>>,
    local_tracks: DashMap<String, Arc<TrackLocalStaticSample>>,
}

impl WebRtcTransport {
    pub async fn new(config: &TransportConfig) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ice_transport_policy: match config.ice_policy {
                IcePolicy::All => RTCIceTransportPolicy::All,
                IcePolicy::Relay => RTCIceTransportPolicy::Relay,
            },
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let handler = HandlerSlot::default();

        let state_slot = handler.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let slot = state_slot.clone();
                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let state = match s {
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                        _ => TransportState::New,
                    };
                    if let Some(handler) = slot.get() {
                        handler.on_connection_state_change(state);
                    }
                })
            },
        ));

        let ice_slot = handler.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let slot = ice_slot.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Some(handler) = slot.get() else { return };
                match candidate.to_json() {
                    Ok(init) => handler.on_ice_candidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }),
                    Err(e) => handler.on_ice_candidate_error(e.to_string()),
                }
            })
        }));

        let dc_slot = handler.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let slot = dc_slot.clone();
            Box::pin(async move {
                debug!("Remote opened data channel '{}'", dc.label());
                bind_channel(&dc, slot.clone());
                if let Some(handler) = slot.get() {
                    handler.on_data_channel(Arc::new(WebRtcDataChannel { inner: dc }));
                }
            })
        }));

        let track_slot = handler.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let slot = track_slot.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Video => TrackKind::Video,
                        _ => TrackKind::Audio,
                    };
                    let remote = RemoteTrack {
                        id: track.id(),
                        kind,
                        stream_id: track.stream_id(),
                    };
                    if let Some(handler) = slot.get() {
                        handler.on_remote_track(remote);
                    }
                })
            },
        ));

        Ok(Self {
            peer_connection,
            handler,
            senders: Mutex::new(Vec::new()),
            local_tracks: DashMap::new(),
        })
    }

    /// Engine-side track for a local capture track; the capture pipeline
    /// writes encoded samples into it.
    pub fn local_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.local_tracks.get(track_id).map(|t| t.value().clone())
    }

    fn engine_track(&self, track: &MediaTrack, stream_id: &str) -> Arc<TrackLocalStaticSample> {
        let mime_type = match track.kind {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            track.id.clone(),
            stream_id.to_owned(),
        ));
        self.local_tracks.insert(track.id.clone(), local.clone());
        local
    }
}

fn bind_channel(dc: &Arc<RTCDataChannel>, slot: HandlerSlot) {
    let label = dc.label().to_owned();

    let open_slot = slot.clone();
    let open_label = label.clone();
    dc.on_open(Box::new(move || {
        let slot = open_slot.clone();
        let label = open_label.clone();
        Box::pin(async move {
            info!("Data channel '{}' open", label);
            if let Some(handler) = slot.get() {
                handler.on_channel_open(label);
            }
        })
    }));

    let msg_slot = slot.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let slot = msg_slot.clone();
        Box::pin(async move {
            if let Some(handler) = slot.get() {
                handler.on_channel_message(msg.data);
            }
        })
    }));

    dc.on_close(Box::new(move || {
        let slot = slot.clone();
        let label = label.clone();
        Box::pin(async move {
            if let Some(handler) = slot.get() {
                handler.on_channel_close(label);
            }
        })
    }));
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    fn bind(&self, handler: Arc<dyn TransportHandler>) {
        self.handler.set(Some(handler));
    }

    fn unbind(&self) {
        self.handler.set(None);
    }

    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.peer_connection
            .set_local_description(session_description(kind, sdp)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.peer_connection
            .set_remote_description(session_description(kind, sdp)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("remote candidate rejected")?;
        Ok(())
    }

    async fn add_track(&self, track: &MediaTrack, stream_id: &str) -> Result<SenderId> {
        let local = self.engine_track(track, stream_id);
        let sender = self
            .peer_connection
            .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP has to be read for the interceptors to keep working.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        let id = SenderId(Uuid::new_v4().to_string());
        self.senders.lock().await.push(BoundSender {
            id: id.clone(),
            kind: track.kind,
            sender,
        });
        Ok(id)
    }

    async fn senders(&self) -> Vec<SenderInfo> {
        self.senders
            .lock()
            .await
            .iter()
            .map(|bound| SenderInfo {
                id: bound.id.clone(),
                kind: Some(bound.kind),
            })
            .collect()
    }

    async fn replace_track(&self, sender: &SenderId, track: &MediaTrack) -> Result<()> {
        let mut senders = self.senders.lock().await;
        let bound = senders
            .iter_mut()
            .find(|bound| &bound.id == sender)
            .with_context(|| format!("unknown sender {sender:?}"))?;

        let stream_id = format!("{}-replaced", bound.id.0);
        let local = self.engine_track(track, &stream_id);
        bound
            .sender
            .replace_track(Some(local as Arc<dyn TrackLocal + Send + Sync>))
            .await?;
        bound.kind = track.kind;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let dc = self
            .peer_connection
            .create_data_channel(label, Some(init))
            .await?;
        bind_channel(&dc, self.handler.clone());
        Ok(Arc::new(WebRtcDataChannel { inner: dc }))
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.peer_connection.close().await {
            warn!("Peer connection close reported: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

fn session_description(kind: SdpKind, sdp: String) -> Result<RTCSessionDescription> {
    let desc = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
    };
    Ok(desc)
}

pub struct WebRtcDataChannel {
    inner: Arc<RTCDataChannel>,
}

#[async_trait]
impl DataChannel for WebRtcDataChannel {
    fn label(&self) -> String {
        self.inner.label().to_owned()
    }

    fn is_open(&self) -> bool {
        self.inner.ready_state() == RTCDataChannelState::Open
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.inner.send_text(text).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

/// Opens a new [`WebRtcTransport`] per call attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcTransportFactory;

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(&self, config: &TransportConfig) -> Result<Arc<dyn PeerTransport>> {
        Ok(Arc::new(WebRtcTransport::new(config).await?))
    }
}
