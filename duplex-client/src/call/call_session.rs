use crate::call::{CallCommand, CallController};
use crate::transport::TransportEvent;
use duplex_core::RelayMessage;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Event loop of one client: user commands, relay messages and transport
/// events, each handled on its own local task.
///
/// Must run inside a [`tokio::task::LocalSet`].
pub struct CallSession {
    controller: CallController,
    command_rx: mpsc::Receiver<CallCommand>,
    relay_rx: mpsc::Receiver<RelayMessage>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl CallSession {
    pub fn new(
        controller: CallController,
        command_rx: mpsc::Receiver<CallCommand>,
        relay_rx: mpsc::Receiver<RelayMessage>,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            controller,
            command_rx,
            relay_rx,
            transport_rx,
        }
    }

    pub fn controller(&self) -> &CallController {
        &self.controller
    }

    pub async fn run(mut self) {
        info!("Call session started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.spawn_command(c),
                        None => {
                            info!("Command channel closed. Shutting down session.");
                            break;
                        }
                    }
                }

                msg = self.relay_rx.recv() => {
                    match msg {
                        Some(m) => self.spawn_signal(m),
                        None => {
                            warn!("Relay connection closed");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => self.spawn_transport_event(e),
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        self.controller.shutdown().await;
        info!("Call session finished");
    }

    fn spawn_command(&self, command: CallCommand) {
        let controller = self.controller.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = controller.execute(command).await {
                controller.report(&e);
            }
        });
    }

    fn spawn_signal(&self, msg: RelayMessage) {
        let controller = self.controller.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = controller.handle_signal(msg).await {
                controller.report(&e);
            }
        });
    }

    fn spawn_transport_event(&self, event: TransportEvent) {
        let controller = self.controller.clone();
        tokio::task::spawn_local(async move {
            controller.handle_transport_event(event).await;
        });
    }
}
