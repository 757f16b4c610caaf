//! Send command implementation.

use anyhow::Result;

use ferry_core::session::Role;
use ferry_core::{SessionController, UserCommand};

use super::SendArgs;

/// Run the send command.
pub async fn run(args: SendArgs, json: bool) -> Result<()> {
    let config = super::load_config();
    super::print_header(json);

    let controller = SessionController::new(Role::Sender, super::engine(), config.session);
    let initial = vec![UserCommand::Select(args.path), UserCommand::StartSharing];
    let metadata = super::drive(controller, initial, json).await?;

    super::report(metadata, json)
}
