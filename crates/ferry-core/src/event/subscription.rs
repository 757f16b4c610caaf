//! Role-scoped view of the engine's event channel.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{BackendEvent, RawEvent};
use crate::session::Role;

/// Yields validated events for one role.
///
/// Events for the other role are skipped, malformed payloads are logged and
/// dropped. A lagging receiver logs how many events it lost and carries on.
#[derive(Debug)]
pub struct EventSubscription {
    role: Role,
    rx: broadcast::Receiver<RawEvent>,
    dropped: u64,
}

impl EventSubscription {
    /// Wrap an engine channel receiver.
    pub const fn new(role: Role, rx: broadcast::Receiver<RawEvent>) -> Self {
        Self {
            role,
            rx,
            dropped: 0,
        }
    }

    /// Number of events discarded because their payload did not parse.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Wait for the next event for this role.
    ///
    /// Returns `None` once the engine closes the channel.
    pub async fn next(&mut self) -> Option<BackendEvent> {
        loop {
            let raw = match self.rx.recv().await {
                Ok(raw) => raw,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("{} event feed lagged, {} events lost", self.role, missed);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            };

            if let Some(event) = self.accept(&raw) {
                return Some(event);
            }
        }
    }

    /// Validate one raw event, counting and logging rejects.
    pub fn accept(&mut self, raw: &RawEvent) -> Option<BackendEvent> {
        match BackendEvent::parse(self.role, raw) {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                tracing::trace!("{} ignoring event '{}'", self.role, raw.name);
                None
            }
            Err(e) => {
                self.dropped += 1;
                tracing::warn!("Dropping {} event: {}", self.role, e);
                None
            }
        }
    }
}
