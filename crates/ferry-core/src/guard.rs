//! Session epoch and manual-stop guard.
//!
//! Background work (a `receive_file` call, a post-completion size lookup)
//! captures the epoch when it is issued and hands it back with its result.
//! The result is applied only if the epoch is still current. Stopping or
//! resetting a session advances the epoch, so anything issued before that
//! point becomes a no-op when it lands.
//!
//! The stop flag is set before any backend command is issued for the stop,
//! so an event handled afterwards always observes it.

/// Monotonic session counter.
pub type Epoch = u64;

/// Epoch counter plus the "stopped by the user" flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopGuard {
    epoch: Epoch,
    stopped: bool,
}

impl StopGuard {
    /// A guard at epoch zero, not stopped.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            epoch: 0,
            stopped: false,
        }
    }

    /// Current epoch.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Whether the user stopped the current session.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether a result tagged with `epoch` may still be applied.
    #[must_use]
    pub const fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch == epoch && !self.stopped
    }

    /// Mark the session stopped and retire its epoch.
    pub fn stop(&mut self) -> Epoch {
        self.stopped = true;
        self.epoch += 1;
        self.epoch
    }

    /// Begin a fresh session: new epoch, flag cleared.
    pub fn renew(&mut self) -> Epoch {
        self.stopped = false;
        self.epoch += 1;
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_retires_epoch() {
        let mut guard = StopGuard::new();
        let issued = guard.renew();
        assert!(guard.is_current(issued));

        guard.stop();
        assert!(guard.is_stopped());
        assert!(!guard.is_current(issued));
        // even the new epoch is not current while stopped
        assert!(!guard.is_current(guard.epoch()));
    }

    #[test]
    fn test_renew_clears_flag() {
        let mut guard = StopGuard::new();
        let first = guard.renew();
        guard.stop();
        let second = guard.renew();

        assert!(second > first);
        assert!(!guard.is_stopped());
        assert!(guard.is_current(second));
        assert!(!guard.is_current(first));
    }
}
