use crate::signaling::SignalingOutput;
use anyhow::{Context, Result};
use async_trait::async_trait;
use duplex_core::{IceCandidate, PeerId, PeerIdentity, RelayMessage, ShareMode};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const INBOUND_CAPACITY: usize = 256;

/// Websocket connection to the relay. Outbound messages are queued on an
/// unbounded channel and written by a background task; inbound messages are
/// delivered on the receiver returned by [`RelayClient::connect`].
#[derive(Clone)]
pub struct RelayClient {
    outbound: mpsc::UnboundedSender<RelayMessage>,
}

impl RelayClient {
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<RelayMessage>)> {
        info!("Connecting to relay: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to relay {url}"))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<RelayMessage>();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        let relay_url = url.to_owned();
        tokio::spawn(async move {
            let mut send_task = tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize relay message: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            let mut recv_task = tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<RelayMessage>(&text) {
                                Ok(msg) => {
                                    debug!("Relay -> {}", msg.event_name());
                                    if inbound_tx.send(msg).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Invalid relay message {:?}: {}", text, e),
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            error!("Relay websocket error: {}", e);
                            break;
                        }
                    }
                }
            });

            tokio::select! {
                _ = (&mut send_task) => recv_task.abort(),
                _ = (&mut recv_task) => send_task.abort(),
            };

            info!("Relay connection closed: {}", relay_url);
        });

        Ok((
            Self {
                outbound: outbound_tx,
            },
            inbound_rx,
        ))
    }

    pub fn emit(&self, msg: RelayMessage) {
        debug!("Relay <- {}", msg.event_name());
        if let Err(e) = self.outbound.send(msg) {
            error!("Relay connection is gone, dropping {}", e.0.event_name());
        }
    }
}

#[async_trait]
impl SignalingOutput for RelayClient {
    async fn announce_available(&self, identity: PeerIdentity) {
        self.emit(RelayMessage::UserAvailable(identity));
    }

    async fn announce_unavailable(&self, id: PeerId) {
        self.emit(RelayMessage::UserUnavailable(id.0));
    }

    async fn announce_deleted(&self, name: String) {
        self.emit(RelayMessage::UserDeleted(name));
    }

    async fn send_offer(&self, target: PeerId, sdp: String, share_mode: ShareMode) {
        self.emit(RelayMessage::Offer {
            peer_id: target,
            sdp,
            share_mode,
        });
    }

    async fn send_answer(&self, target: PeerId, sdp: String) {
        self.emit(RelayMessage::Answer {
            peer_id: target,
            sdp,
        });
    }

    async fn send_ice(&self, candidate: IceCandidate) {
        self.emit(RelayMessage::IceCandidate(candidate));
    }

    async fn send_reject(&self, target: PeerId) {
        self.emit(RelayMessage::Reject(target));
    }
}
