//! Rate limiting between raw progress samples and presentation updates.
//!
//! Two strategies are available:
//!
//! - **Interval replay**: every sample overwrites a cell; a fixed-period tick
//!   copies the cell out. The output is never staler than one period, even
//!   when samples stop mid-burst.
//! - **Trailing debounce**: every sample (re)arms a one-shot deadline; only
//!   the last sample of a burst comes out, one delay after it arrived.
//!
//! Neither strategy owns a timer. The owner asks for [`Coalescer::deadline`],
//! sleeps until then and calls [`Coalescer::poll`], which keeps all state
//! changes on the caller's task.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Which coalescing strategy a role uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoalescePolicy {
    /// Fixed-period replay of the latest sample
    Interval,
    /// Commit the last sample of each burst
    Debounce,
}

/// Fixed-period replay of the latest value.
#[derive(Debug, Clone)]
pub struct IntervalReplay<T> {
    period: Duration,
    cell: Option<T>,
    next_tick: Option<Instant>,
}

impl<T: Clone> IntervalReplay<T> {
    /// Create a stopped replay with the given period.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            cell: None,
            next_tick: None,
        }
    }

    /// Start ticking; the first tick is one period from `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now + self.period);
    }

    /// Overwrite the cell. Never produces output by itself.
    pub fn record(&mut self, value: T) {
        self.cell = Some(value);
    }

    /// Copy the cell out if a tick is due, then schedule the next one.
    ///
    /// Missed ticks are skipped rather than replayed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self.next_tick?;
        if now < due {
            return None;
        }
        let mut next = due + self.period;
        while next <= now {
            next += self.period;
        }
        self.next_tick = Some(next);
        self.cell.clone()
    }

    /// When the next tick is due, if running.
    pub const fn deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Stop ticking. The cell is kept for a final flush.
    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    /// Take the latest recorded value.
    pub fn flush(&mut self) -> Option<T> {
        self.cell.take()
    }
}

/// Trailing-edge debounce.
#[derive(Debug, Clone)]
pub struct TrailingDebounce<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
    active: bool,
}

impl<T> TrailingDebounce<T> {
    /// Create an inactive debounce with the given delay.
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            active: false,
        }
    }

    /// Accept samples from now on.
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Replace any pending value and push the deadline out by one delay.
    pub fn record(&mut self, value: T, now: Instant) {
        if self.active {
            self.pending = Some((value, now + self.delay));
        }
    }

    /// Release the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((_, due)) if due <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// When the pending value is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    /// Cancel the pending value and stop accepting samples.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Take the pending value regardless of its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

/// Either strategy behind one interface.
#[derive(Debug, Clone)]
pub enum Coalescer<T> {
    /// See [`IntervalReplay`]
    Interval(IntervalReplay<T>),
    /// See [`TrailingDebounce`]
    Debounce(TrailingDebounce<T>),
}

impl<T: Clone> Coalescer<T> {
    /// Build the strategy selected by `policy`.
    pub fn new(policy: CoalescePolicy, replay_interval: Duration, debounce_delay: Duration) -> Self {
        match policy {
            CoalescePolicy::Interval => Self::Interval(IntervalReplay::new(replay_interval)),
            CoalescePolicy::Debounce => Self::Debounce(TrailingDebounce::new(debounce_delay)),
        }
    }

    /// Begin coalescing; called when transport starts.
    pub fn start(&mut self, now: Instant) {
        match self {
            Self::Interval(replay) => replay.start(now),
            Self::Debounce(debounce) => debounce.start(),
        }
    }

    /// Feed one sample.
    pub fn record(&mut self, value: T, now: Instant) {
        match self {
            Self::Interval(replay) => replay.record(value),
            Self::Debounce(debounce) => debounce.record(value, now),
        }
    }

    /// Value to commit at `now`, if any.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self {
            Self::Interval(replay) => replay.poll(now),
            Self::Debounce(debounce) => debounce.poll(now),
        }
    }

    /// Next instant at which [`poll`](Self::poll) may produce output.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Interval(replay) => replay.deadline(),
            Self::Debounce(debounce) => debounce.deadline(),
        }
    }

    /// Stop producing output.
    pub fn stop(&mut self) {
        match self {
            Self::Interval(replay) => replay.stop(),
            Self::Debounce(debounce) => {
                debounce.stop();
                debounce.flush();
            }
        }
    }

    /// Stop and hand back the most recent value not yet committed.
    pub fn finish(&mut self) -> Option<T> {
        match self {
            Self::Interval(replay) => {
                replay.stop();
                replay.flush()
            }
            Self::Debounce(debounce) => {
                debounce.stop();
                debounce.flush()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_interval_replays_latest_value() {
        let t0 = Instant::now();
        let mut replay = IntervalReplay::new(50 * MS);

        // not started: nothing comes out
        replay.record(1);
        assert_eq!(replay.poll(t0 + 100 * MS), None);

        replay.start(t0);
        assert_eq!(replay.deadline(), Some(t0 + 50 * MS));
        replay.record(2);
        replay.record(3);
        assert_eq!(replay.poll(t0 + 10 * MS), None);
        assert_eq!(replay.poll(t0 + 50 * MS), Some(3));

        // no new samples: the same value is replayed on the next tick
        assert_eq!(replay.poll(t0 + 100 * MS), Some(3));
    }

    #[test]
    fn test_interval_skips_missed_ticks() {
        let t0 = Instant::now();
        let mut replay = IntervalReplay::new(50 * MS);
        replay.start(t0);
        replay.record("a");

        assert_eq!(replay.poll(t0 + 175 * MS), Some("a"));
        assert_eq!(replay.deadline(), Some(t0 + 200 * MS));

        replay.stop();
        assert_eq!(replay.deadline(), None);
        assert_eq!(replay.poll(t0 + 500 * MS), None);
        assert_eq!(replay.flush(), Some("a"));
    }

    #[test]
    fn test_debounce_commits_last_of_burst() {
        let t0 = Instant::now();
        let mut debounce = TrailingDebounce::new(100 * MS);
        debounce.start();

        debounce.record(1, t0);
        debounce.record(2, t0 + 40 * MS);
        debounce.record(3, t0 + 80 * MS);

        // the deadline moved with every sample
        assert_eq!(debounce.deadline(), Some(t0 + 180 * MS));
        assert_eq!(debounce.poll(t0 + 150 * MS), None);
        assert_eq!(debounce.poll(t0 + 180 * MS), Some(3));
        assert_eq!(debounce.poll(t0 + 300 * MS), None);
        assert_eq!(debounce.deadline(), None);
    }

    #[test]
    fn test_debounce_inactive_ignores_samples() {
        let t0 = Instant::now();
        let mut debounce = TrailingDebounce::new(10 * MS);
        debounce.record(1, t0);
        assert_eq!(debounce.deadline(), None);

        debounce.start();
        debounce.record(2, t0);
        debounce.stop();
        debounce.record(3, t0);
        assert_eq!(debounce.flush(), Some(2));
    }

    #[test]
    fn test_coalescer_finish_returns_uncommitted_value() {
        let t0 = Instant::now();
        for policy in [CoalescePolicy::Interval, CoalescePolicy::Debounce] {
            let mut coalescer = Coalescer::new(policy, 50 * MS, 100 * MS);
            coalescer.start(t0);
            coalescer.record(7u64, t0 + 5 * MS);
            assert_eq!(coalescer.finish(), Some(7), "{policy:?}");
            assert_eq!(coalescer.deadline(), None, "{policy:?}");
            assert_eq!(coalescer.poll(t0 + Duration::from_secs(1)), None);
        }
    }

    #[test]
    fn test_coalescer_stop_discards_pending_debounce() {
        let t0 = Instant::now();
        let mut coalescer = Coalescer::new(CoalescePolicy::Debounce, 50 * MS, 100 * MS);
        coalescer.start(t0);
        coalescer.record(1u64, t0);
        coalescer.stop();
        assert_eq!(coalescer.poll(t0 + Duration::from_secs(1)), None);
    }
}
