//! Ferry CLI - ticket-based file transfers
//!
//! Ferry shares a file or directory behind a ticket and receives what a
//! ticket points to, rendering live progress from the session controller.
//!
//! ## Quick Start
//!
//! ```bash
//! # Share a directory
//! ferry send ./photos
//!
//! # Receive it (on another device)
//! ferry receive blob7x2k... -o ~/Downloads
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
mod sim;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Send(args) => commands::send::run(args, cli.json).await,
        Command::Receive(args) => commands::receive::run(args, cli.json).await,
        Command::Config(args) => commands::config::run(args, cli.json).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "debug"
    } else {
        "warn,ferry=info,ferry_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
