//! Event loop that drives a [`SessionController`].
//!
//! One task owns the controller and multiplexes user commands, the engine's
//! event feed, background completions and the controller's own deadlines.
//! The controller never needs a lock because nothing else touches it.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::SessionController;
use crate::event::subscription::EventSubscription;

/// Commands a presentation layer can send to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Select a file or directory to share
    Select(PathBuf),
    /// Share the selected resource
    StartSharing,
    /// Receive `ticket` into `output`
    Receive {
        /// Ticket from the sender
        ticket: String,
        /// Output directory
        output: PathBuf,
    },
    /// Stop the current session
    Stop,
    /// Return to idle from a finished session
    Reset,
    /// Clear the pending alert
    DismissAlert,
    /// Exit the loop
    Shutdown,
}

impl fmt::Display for UserCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(path) => write!(f, "select {}", path.display()),
            Self::StartSharing => f.write_str("start sharing"),
            Self::Receive { ticket, .. } => write!(f, "receive {ticket}"),
            Self::Stop => f.write_str("stop"),
            Self::Reset => f.write_str("reset"),
            Self::DismissAlert => f.write_str("dismiss alert"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

impl SessionController {
    /// Apply one user command. Failures are already surfaced as alerts.
    pub async fn execute(&mut self, command: UserCommand) {
        tracing::debug!("{} command: {}", self.role(), command);
        let result = match command {
            UserCommand::Select(path) => self.select(path).await.map(|_| ()),
            UserCommand::StartSharing => self.start_sharing().await.map(|_| ()),
            UserCommand::Receive { ticket, output } => self.receive(&ticket, output).await,
            UserCommand::Stop => self.stop().await,
            UserCommand::Reset => self.reset(),
            UserCommand::DismissAlert => {
                self.dismiss_alert();
                Ok(())
            }
            UserCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!("{} command rejected: {}", self.role(), e);
        }
    }
}

/// Run `controller` until [`UserCommand::Shutdown`] arrives or the command
/// channel closes, then hand it back.
///
/// The engine feed is subscribed once, here, for the controller's whole
/// lifetime.
pub async fn run(
    mut controller: SessionController,
    mut commands: mpsc::UnboundedReceiver<UserCommand>,
) -> SessionController {
    let role = controller.role();
    let mut events = EventSubscription::new(role, controller.backend().subscribe());
    let mut events_open = true;
    let (_keep_open, fallback) = mpsc::unbounded_channel();
    let mut completions = controller.take_completions().unwrap_or_else(|| {
        tracing::warn!("{} completions already taken, background results will be lost", role);
        fallback
    });

    tracing::debug!("{} driver started (epoch {})", role, controller.epoch());

    loop {
        let deadline = controller.next_deadline();
        tokio::select! {
            command = commands.recv() => match command {
                Some(UserCommand::Shutdown) | None => break,
                Some(command) => controller.execute(command).await,
            },
            event = events.next(), if events_open => match event {
                Some(event) => controller.handle_event(event, Instant::now()),
                None => {
                    tracing::warn!("{} event feed closed", role);
                    events_open = false;
                }
            },
            Some(completion) = completions.recv() => controller.apply_completion(completion),
            () = sleep_until(deadline) => controller.tick(Instant::now()),
        }
    }

    tracing::debug!(
        "{} driver stopped at epoch {}, {} malformed events dropped",
        role,
        controller.epoch(),
        events.dropped()
    );
    controller
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
