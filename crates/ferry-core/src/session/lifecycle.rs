//! Lifecycle transitions for [`TransferSession`].
//!
//! ```text
//! sender:   Idle -> AwaitingPeer -> Transporting -> Completed
//! receiver: Idle ----------------> Transporting -> Completed
//! ```
//!
//! `Completed` is left only through [`TransferSession::reset`] or
//! [`TransferSession::restart`]. A user stop may complete the session from
//! `AwaitingPeer` as well as from `Transporting`.

use chrono::{DateTime, Utc};

use super::{Phase, Role, TerminalReason, TransferSession};
use crate::error::{Error, Result};

impl TransferSession {
    /// Whether moving to `to` is a legal transition from the current phase.
    #[must_use]
    pub fn can_enter(&self, to: Phase) -> bool {
        matches!(
            (self.role, self.phase, to),
            (Role::Sender, Phase::Idle, Phase::AwaitingPeer)
                | (Role::Sender, Phase::AwaitingPeer, Phase::Transporting)
                | (Role::Receiver, Phase::Idle, Phase::Transporting)
                | (_, Phase::AwaitingPeer | Phase::Transporting, Phase::Completed)
                | (_, _, Phase::Idle)
        )
    }

    fn enter(&mut self, to: Phase) -> Result<()> {
        if !self.can_enter(to) {
            return Err(Error::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!("{} session: {} -> {}", self.role, self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Ticket issued; wait for a peer.
    pub fn begin_awaiting_peer(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.enter(Phase::AwaitingPeer)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Bytes started moving.
    pub fn begin_transporting(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.enter(Phase::Transporting)?;
        self.started_at.get_or_insert(now);
        Ok(())
    }

    /// Record the terminal outcome.
    ///
    /// Natural completion and engine failure require `Transporting`; a user
    /// stop is also accepted while awaiting a peer.
    pub fn complete(&mut self, reason: TerminalReason, now: DateTime<Utc>) -> Result<()> {
        if reason != TerminalReason::UserStopped && self.phase != Phase::Transporting {
            return Err(Error::InvalidTransition {
                from: self.phase,
                to: Phase::Completed,
            });
        }
        self.enter(Phase::Completed)?;
        self.terminal_reason = Some(reason);
        self.ended_at = Some(now);
        Ok(())
    }

    /// Return to `Idle`, forgetting the selected resource.
    pub fn reset(&mut self) {
        *self = Self::new(self.role);
    }

    /// Return to `Idle` for another attempt with the same resource.
    pub fn restart(&mut self) {
        let resource_path = self.resource_path.take();
        let resource_kind = self.resource_kind.take();
        self.reset();
        self.resource_path = resource_path;
        self.resource_kind = resource_kind;
    }
}
