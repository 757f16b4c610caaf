//! User-initiated stop.
//!
//! What a stop does depends on where the session is:
//!
//! | Phase | Effect |
//! |-------|--------|
//! | `Idle` | nothing |
//! | `AwaitingPeer` | `stop_sharing` is awaited; on success the session resets |
//! | `Transporting` | completes as stopped at once, `stop_sharing` runs in the background |
//! | `Completed` | the summary is dismissed, `stop_sharing` runs in the background |
//!
//! In the transporting case the guard is flipped before anything else, so
//! an engine completion that is already queued lands on a stopped session
//! and is ignored.

use chrono::Utc;
use std::sync::Arc;

use super::SessionController;
use crate::error::Result;
use crate::session::{Phase, ResourceKind, TerminalReason, TransferMetadata};

impl SessionController {
    /// Stop the current session.
    ///
    /// Only the `AwaitingPeer` case can fail, when the engine refuses to stop
    /// sharing; the session then stays as it was and an alert is raised.
    pub async fn stop(&mut self) -> Result<()> {
        match self.phase() {
            Phase::Idle => {
                tracing::debug!("Nothing to stop");
                Ok(())
            }
            Phase::AwaitingPeer => match self.backend.stop_sharing().await {
                Ok(()) => {
                    tracing::info!("Stopped sharing before a peer connected");
                    self.clear(false);
                    self.publish();
                    Ok(())
                }
                Err(e) => {
                    self.raise_alert(&e);
                    Err(e)
                }
            },
            Phase::Transporting => {
                self.stop_transport();
                Ok(())
            }
            Phase::Completed => {
                self.clear(false);
                self.publish();
                self.stop_in_background();
                Ok(())
            }
        }
    }

    fn stop_transport(&mut self) {
        self.guard.stop();
        self.coalescer.stop();
        self.throughput_due = None;

        let partial_bytes = self
            .latest
            .map_or(self.snapshot.bytes_transferred, |reading| {
                reading.bytes_transferred
            });
        let ended_at = Utc::now();
        if let Err(e) = self.session.complete(TerminalReason::UserStopped, ended_at) {
            tracing::warn!("Cannot mark session stopped: {}", e);
            return;
        }

        self.metadata = Some(TransferMetadata::stopped(
            self.display_name(),
            self.session.resource_kind.unwrap_or(ResourceKind::File),
            self.session.started_at.unwrap_or(ended_at),
            ended_at,
            self.destination_path(),
            partial_bytes,
        ));
        tracing::info!(
            "{} session stopped by user after {} bytes",
            self.role(),
            partial_bytes
        );
        self.publish();
        self.stop_in_background();
    }

    fn stop_in_background(&self) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.stop_sharing().await {
                tracing::warn!("stop_sharing after stop failed: {}", e);
            }
        });
    }
}
