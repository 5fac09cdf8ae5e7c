mod capture;
mod config;
mod terminal;

use crate::capture::SilentCapture;
use crate::config::AppConfig;
use crate::terminal::{Input, TerminalObserver};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use duplex::client::{CallCommand, CallController, CallSession, RelayClient, WebRtcTransportFactory};
use duplex::model::{PeerId, PeerIdentity};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duplex")]
#[command(about = "Two-party audio/video call client over a relay")]
struct Args {
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay websocket URL.
    #[arg(long)]
    relay: Option<String>,

    #[arg(short, long)]
    name: Option<String>,

    /// Peer id to register with; random when omitted.
    #[arg(long)]
    id: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,duplex=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(relay) = args.relay {
        config.relay_url = relay;
    }
    if let Some(name) = args.name {
        config.display_name = name;
    }
    if let Some(id) = args.id {
        config.peer_id = Some(id);
    }

    LocalSet::new().run_until(run(config)).await
}

async fn run(config: AppConfig) -> Result<()> {
    let id = config.peer_id.map(PeerId::from).unwrap_or_default();
    let identity = PeerIdentity::new(id.clone(), config.display_name.clone());

    let (relay, relay_rx) = RelayClient::connect(&config.relay_url)
        .await
        .with_context(|| format!("Cannot reach relay at {}", config.relay_url))?;
    info!("Connected to relay {}", config.relay_url);

    let (controller, transport_rx) = CallController::new(
        identity,
        Arc::new(relay),
        Arc::new(WebRtcTransportFactory),
        config.transport,
        Arc::new(SilentCapture),
        Rc::new(TerminalObserver),
    );
    let (command_tx, command_rx) = mpsc::channel(32);
    let session = CallSession::new(controller.clone(), command_rx, relay_rx, transport_rx);
    let session_task = tokio::task::spawn_local(session.run());

    println!(
        "{} {} as {}, /help for commands",
        "Online".green().bold(),
        config.display_name,
        id.to_string().cyan()
    );
    command_tx
        .send(CallCommand::Register(config.display_name))
        .await
        .context("Call session stopped")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match terminal::parse_line(&line) {
            Ok(Input::Command(command)) => {
                if command_tx.send(command).await.is_err() {
                    break;
                }
            }
            Ok(Input::Peers) => terminal::print_peers(&controller.presence().list()),
            Ok(Input::Help) => terminal::print_help(),
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => {}
            Err(usage) => eprintln!("{}", usage.red()),
        }
    }

    drop(command_tx);
    session_task.await?;
    Ok(())
}
