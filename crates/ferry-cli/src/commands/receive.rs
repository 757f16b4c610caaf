//! Receive command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};

use ferry_core::session::Role;
use ferry_core::{SessionController, UserCommand};

use super::ReceiveArgs;

/// Run the receive command.
pub async fn run(args: ReceiveArgs, json: bool) -> Result<()> {
    let config = super::load_config();

    let output = args
        .output
        .or_else(|| config.general.default_output.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;

    super::print_header(json);
    if !json {
        println!("  Receiving into {}", output.display());
        println!();
    }

    let controller = SessionController::new(Role::Receiver, super::engine(), config.session);
    let initial = vec![UserCommand::Receive {
        ticket: args.ticket,
        output,
    }];
    let metadata = super::drive(controller, initial, json).await?;

    super::report(metadata, json)
}
