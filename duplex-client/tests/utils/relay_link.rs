use duplex_core::{PeerId, RelayMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One direction of an in-memory relay: forwards what `from` emits to the
/// other party, rewriting unicast targets to the sender id the way the
/// relay server does.
pub fn relay_link(
    from: PeerId,
    mut outbound: mpsc::UnboundedReceiver<RelayMessage>,
    to: mpsc::Sender<RelayMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let delivered = match msg {
                RelayMessage::Offer {
                    sdp, share_mode, ..
                } => RelayMessage::Offer {
                    peer_id: from.clone(),
                    sdp,
                    share_mode,
                },
                RelayMessage::Answer { sdp, .. } => RelayMessage::Answer {
                    peer_id: from.clone(),
                    sdp,
                },
                RelayMessage::Reject(_) => RelayMessage::Reject(from.clone()),
                other => other,
            };
            if to.send(delivered).await.is_err() {
                break;
            }
        }
    })
}
