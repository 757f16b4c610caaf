//! Whole-transfer byte reconstruction for directory sessions.
//!
//! For directories the engine reports progress per entry, and the counter
//! falls back to (nearly) zero whenever a new entry starts. There is no
//! explicit boundary signal, so a boundary is inferred when a sample drops
//! below half of the previous one, or to zero. The peak of the finished
//! entry is then folded into the running total.

use std::time::Duration;

use crate::estimate;

/// Ratio below which a backwards move counts as a new entry.
const BOUNDARY_RATIO: f64 = 0.5;

/// Running state of the reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteAccumulator {
    prior_entries_bytes: u64,
    current_entry_peak_bytes: u64,
    last_observed_bytes: u64,
}

impl ByteAccumulator {
    /// A zeroed accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prior_entries_bytes: 0,
            current_entry_peak_bytes: 0,
            last_observed_bytes: 0,
        }
    }

    /// Bytes attributed to entries that have finished.
    #[must_use]
    pub const fn prior_entries_bytes(&self) -> u64 {
        self.prior_entries_bytes
    }

    /// Highest count seen for the entry in progress.
    #[must_use]
    pub const fn current_entry_peak_bytes(&self) -> u64 {
        self.current_entry_peak_bytes
    }

    /// Last raw sample.
    #[must_use]
    pub const fn last_observed_bytes(&self) -> u64 {
        self.last_observed_bytes
    }

    /// Feed one raw per-entry sample and return the whole-transfer total.
    pub fn observe(&mut self, sample: u64) -> u64 {
        if sample > self.current_entry_peak_bytes {
            self.current_entry_peak_bytes = sample;
        }

        let last = self.last_observed_bytes;
        let peak = self.current_entry_peak_bytes;
        let threshold = last as f64 * BOUNDARY_RATIO;
        let dropped_sharply = last > 0 && (sample as f64) < threshold && peak > 0;
        let reset_to_zero = sample == 0 && last > 0 && peak > 0;

        if dropped_sharply || reset_to_zero {
            tracing::debug!(
                "Entry boundary at {} bytes (previous entry peaked at {})",
                sample,
                peak
            );
            self.prior_entries_bytes = self.prior_entries_bytes.saturating_add(peak);
            self.current_entry_peak_bytes = sample;
            self.last_observed_bytes = sample;
        } else if sample > last || (sample as f64) >= threshold {
            // forward progress, or jitter within the same entry
            self.last_observed_bytes = sample;
        }

        self.total(sample)
    }

    /// Whole-transfer total for `sample` without updating state.
    #[must_use]
    pub const fn total(&self, sample: u64) -> u64 {
        self.prior_entries_bytes.saturating_add(sample)
    }

    /// Average throughput of the whole transfer since transport started.
    #[must_use]
    pub fn throughput(&self, sample: u64, elapsed: Duration) -> f64 {
        estimate::average_throughput(self.total(sample), elapsed)
    }

    /// Zero every field for a new session.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
