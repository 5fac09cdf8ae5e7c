use colored::*;
use duplex::client::{CallCommand, CallError, CallNotice, CallObserver, EndReason, RemoteTrack};
use duplex::model::{CallState, ChatMessage, PeerId, PresenceEntry, ShareMode};

/// One line of user input.
#[derive(Debug, PartialEq)]
pub enum Input {
    Command(CallCommand),
    Peers,
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Command(CallCommand::SendChat(line.to_owned())));
    };

    let mut words = rest.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let input = match verb {
        "call" => {
            let target = words.next().ok_or("usage: /call <peer-id> [audio|camera|display]")?;
            let share_mode = match words.next() {
                Some(mode) => mode.parse::<ShareMode>()?,
                None => ShareMode::AudioOnly,
            };
            Input::Command(CallCommand::Place {
                target: PeerId::from(target),
                share_mode,
            })
        }
        "accept" => Input::Command(CallCommand::Accept),
        "reject" => Input::Command(CallCommand::Reject),
        "hangup" => Input::Command(CallCommand::HangUp),
        "share" => Input::Command(CallCommand::ShareScreen),
        "clear" => Input::Command(CallCommand::ClearChat),
        "name" => {
            let name = words.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err("usage: /name <display name>".to_owned());
            }
            Input::Command(CallCommand::Register(name))
        }
        "peers" => Input::Peers,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command /{other}, try /help")),
    };
    Ok(input)
}

pub fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  /call <peer-id> [audio|camera|display]");
    println!("  /accept, /reject, /hangup");
    println!("  /share          switch outgoing video to the screen");
    println!("  /peers          list known peers");
    println!("  /name <name>    change display name");
    println!("  /clear          clear the chat log");
    println!("  /quit");
    println!("  anything else is sent as chat");
}

pub fn print_peers(entries: &[PresenceEntry]) {
    if entries.is_empty() {
        println!("{}", "No peers online".dimmed());
        return;
    }
    for entry in entries {
        let marker = if entry.is_available() {
            "available".green()
        } else {
            "busy".yellow()
        };
        println!(
            "  {} {} [{}]",
            entry.identity.id.to_string().cyan(),
            entry.identity.display_name,
            marker
        );
    }
}

/// Prints call activity to the terminal.
pub struct TerminalObserver;

impl CallObserver for TerminalObserver {
    fn on_state_change(&self, from: CallState, to: CallState) {
        println!("{}", format!("[{from} -> {to}]").dimmed());
    }

    fn on_notice(&self, notice: &CallNotice) {
        match notice {
            CallNotice::IncomingCall { caller, share_mode } => println!(
                "{} {} ({:?}), /accept or /reject",
                "Incoming call from".yellow().bold(),
                caller,
                share_mode
            ),
            CallNotice::Connected { peer } => {
                println!("{} {}", "Connected to".green().bold(), peer)
            }
            CallNotice::Ended { peer, reason } => {
                let why = match reason {
                    EndReason::HungUp => "hung up".to_owned(),
                    EndReason::Declined => "declined".to_owned(),
                    EndReason::RemoteRejected => "rejected by peer".to_owned(),
                    EndReason::Cancelled => "cancelled by caller".to_owned(),
                    EndReason::RemoteUnavailable => "peer left".to_owned(),
                    EndReason::Terminated(state) => format!("connection {state:?}"),
                    EndReason::Failed(err) => err.clone(),
                };
                println!("{} {} ({})", "Call ended with".red().bold(), peer, why);
            }
            CallNotice::Relay(text) => println!("{} {}", "relay:".blue(), text),
        }
    }

    fn on_chat_message(&self, message: &ChatMessage) {
        println!(
            "{} {} {}",
            message.timestamp.format("%H:%M").to_string().dimmed(),
            format!("{}:", message.sender_name).cyan().bold(),
            message.body
        );
    }

    fn on_remote_track(&self, track: &RemoteTrack) {
        println!("{}", format!("receiving {:?} from peer", track.kind).dimmed());
    }

    fn on_error(&self, error: &CallError) {
        match error {
            // Already printed with the call-ended notice.
            CallError::RemoteRejected(_) | CallError::RemoteUnavailable(_) => {}
            _ => eprintln!("{} {}", "error:".red().bold(), error),
        }
    }
}
