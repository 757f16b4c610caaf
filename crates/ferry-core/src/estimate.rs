//! Speed and ETA arithmetic.
//!
//! Pure helpers shared by the controller and the front ends:
//!
//! - Moving-average smoothing of instantaneous speed samples
//! - Average throughput from a byte count and an elapsed time
//! - ETA from remaining bytes
//! - Human-readable sizes, speeds and durations

use std::collections::VecDeque;
use std::time::Duration;

/// Moving-average speed smoother over the last `capacity` samples.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    window: VecDeque<f64>,
    capacity: usize,
}

impl SpeedEstimator {
    /// Create an estimator averaging over `capacity` samples (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a speed sample (bytes per second) and return the new average.
    ///
    /// Negative and non-finite samples are recorded as zero.
    pub fn push(&mut self, speed: f64) -> f64 {
        let speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(speed);
        self.average()
    }

    /// Current moving average, zero when no samples have been pushed.
    #[must_use]
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Forget every sample.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Average throughput in bytes per second.
///
/// Returns zero until some time has elapsed.
#[must_use]
pub fn average_throughput(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

/// Seconds left to move `remaining` bytes at `speed` bytes per second.
///
/// `None` when the speed is not positive.
#[must_use]
pub fn eta_seconds(remaining: u64, speed: f64) -> Option<f64> {
    if speed > 0.0 && speed.is_finite() {
        Some(remaining as f64 / speed)
    } else {
        None
    }
}

/// Share of `total` already transferred, in percent. Zero when the total is unknown.
#[must_use]
pub fn percentage(transferred: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        transferred as f64 / total as f64 * 100.0
    }
}

/// Format a byte count as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format a speed in bytes per second.
pub fn format_speed(bytes_per_second: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = bytes_per_second.max(0.0) as u64;
    format!("{}/s", format_size(whole))
}

/// Format an ETA as "M:SS", or "H:MM:SS" past an hour.
pub fn format_eta(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0).ceil() as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}
