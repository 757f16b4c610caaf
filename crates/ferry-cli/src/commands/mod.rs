//! CLI command definitions and handlers.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};

use ferry_core::backend::TransferBackend;
use ferry_core::controller::driver;
use ferry_core::session::{display_name_for_path, Phase, TransferMetadata};
use ferry_core::{SessionController, SessionView, UserCommand};

use crate::sim::{SimOptions, SimulatedBackend};
use crate::ui::{progress_line, summary_lines, TicketBox};

pub mod config;
pub mod receive;
pub mod send;

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist or can't be parsed, it falls back to defaults.
pub fn load_config() -> ferry_core::config::Config {
    ferry_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        ferry_core::config::Config::default()
    })
}

/// Engine the commands run against.
pub fn engine() -> Arc<dyn TransferBackend> {
    Arc::new(SimulatedBackend::new(SimOptions::default()))
}

/// Ferry - ticket-based file transfers
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the final summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Share a file or directory behind a ticket
    Send(SendArgs),

    /// Receive what a ticket points to
    Receive(ReceiveArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// File or directory to share
    pub path: PathBuf,
}

/// Arguments for the receive command
#[derive(Parser)]
pub struct ReceiveArgs {
    /// Ticket from the sender
    pub ticket: String,

    /// Output directory for received files
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Print the banner shown at the top of interactive commands.
pub fn print_header(json: bool) {
    if !json {
        println!();
        println!("Ferry v{}", ferry_core::VERSION);
        println!("{}", "-".repeat(37));
        println!();
    }
}

/// Run `controller` on a driver task, issue `initial` commands, and follow
/// the published view until the session ends.
///
/// Returns the completion metadata, or `None` if the session was stopped
/// before any transfer started.
pub async fn drive(
    controller: SessionController,
    initial: Vec<UserCommand>,
    json: bool,
) -> Result<Option<TransferMetadata>> {
    let mut view = controller.subscribe_view();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(driver::run(controller, rx));

    for command in initial {
        tx.send(command).context("session driver exited early")?;
    }

    let outcome = follow(&mut view, &tx, json).await;

    let _ = tx.send(UserCommand::Shutdown);
    handle.await.context("session driver panicked")?;
    outcome
}

async fn follow(
    view: &mut watch::Receiver<SessionView>,
    commands: &mpsc::UnboundedSender<UserCommand>,
    json: bool,
) -> Result<Option<TransferMetadata>> {
    let mut left_idle = false;
    let mut ticket_shown = false;
    let mut progress_shown = false;
    let mut stop_requested = false;

    loop {
        let current = view.borrow_and_update().clone();

        match current.session.phase {
            Phase::Idle => {
                if let Some(alert) = current.alert {
                    end_line(progress_shown);
                    bail!(alert);
                }
                if left_idle {
                    end_line(progress_shown);
                    return Ok(None);
                }
            }
            Phase::AwaitingPeer => {
                left_idle = true;
                if !ticket_shown && !json {
                    if let Some(ticket) = &current.ticket {
                        let name = current
                            .session
                            .resource_path
                            .as_deref()
                            .map(display_name_for_path)
                            .unwrap_or_default();
                        TicketBox::new(ticket).with_name(&name).display();
                        println!();
                        println!("  Waiting for a receiver... (Ctrl-C to stop)");
                        ticket_shown = true;
                    }
                }
            }
            Phase::Transporting => {
                left_idle = true;
                if !json {
                    print!("\r  {}   ", progress_line(&current.progress));
                    let _ = io::stdout().flush();
                    progress_shown = true;
                }
            }
            Phase::Completed => {
                end_line(progress_shown);
                return Ok(current.metadata);
            }
        }

        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    bail!("session driver exited");
                }
            }
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal.context("failed to listen for Ctrl-C")?;
                stop_requested = true;
                tracing::debug!("Ctrl-C received, stopping session");
                commands.send(UserCommand::Stop).context("session driver exited")?;
            }
        }
    }
}

fn end_line(progress_shown: bool) {
    if progress_shown {
        println!();
    }
}

/// Print the outcome of a session and turn failures into errors.
pub fn report(metadata: Option<TransferMetadata>, json: bool) -> Result<()> {
    let Some(metadata) = metadata else {
        if json {
            println!("{}", serde_json::json!({ "stopped": true }));
        } else {
            println!();
            println!("  Stopped before a receiver connected.");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        println!();
        for line in summary_lines(&metadata) {
            println!("  {line}");
        }
        println!();
    }

    if metadata.outcome == ferry_core::session::TerminalReason::EngineFailure {
        bail!("transfer of {} failed", metadata.display_name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_receive() {
        let cli = Cli::try_parse_from(["ferry", "--json", "receive", "blobabc", "-o", "/tmp"]).unwrap();
        assert!(cli.json);
        assert!(!cli.verbose);
        match cli.command {
            Command::Receive(args) => {
                assert_eq!(args.ticket, "blobabc");
                assert_eq!(args.output, Some(PathBuf::from("/tmp")));
            }
            _ => panic!("expected receive"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ferry", "send", "notes.txt", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Send(_)));
    }
}
