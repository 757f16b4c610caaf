//! UI utilities for Ferry CLI.

use ferry_core::estimate::{format_eta, format_size, format_speed};
use ferry_core::session::{ProgressSnapshot, TerminalReason, TransferMetadata};

const BOX_WIDTH: usize = 44;
const BAR_WIDTH: usize = 24;

/// A formatted box for displaying a ticket.
pub struct TicketBox<'a> {
    ticket: &'a str,
    name: Option<&'a str>,
}

impl<'a> TicketBox<'a> {
    /// Create a new ticket box.
    #[must_use]
    pub const fn new(ticket: &'a str) -> Self {
        Self { ticket, name: None }
    }

    /// Show what is being shared under the ticket.
    #[must_use]
    pub const fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Display the ticket box to stdout.
    pub fn display(&self) {
        println!("  ┌{}┐", "─".repeat(BOX_WIDTH));
        println!("  │{}│", " ".repeat(BOX_WIDTH));
        if let Some(name) = self.name {
            println!("  │{}│", center_in_box(&truncate(name, BOX_WIDTH - 2), BOX_WIDTH));
            println!("  │{}│", " ".repeat(BOX_WIDTH));
        }
        for line in wrap(self.ticket, BOX_WIDTH - 4) {
            println!("  │{}│", center_in_box(&line, BOX_WIDTH));
        }
        println!("  │{}│", " ".repeat(BOX_WIDTH));
        println!("  └{}┘", "─".repeat(BOX_WIDTH));
    }
}

fn center_in_box(content: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// One-line progress rendering, e.g.
/// `[##########--------------]  42.0%  4.2 MB / 10.0 MB  1.5 MB/s  ETA 0:04`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn progress_line(progress: &ProgressSnapshot) -> String {
    let pct = progress.percentage();
    let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));

    let amount = if progress.total_bytes > 0 {
        format!(
            "{} / {}",
            format_size(progress.bytes_transferred),
            format_size(progress.total_bytes)
        )
    } else {
        format_size(progress.bytes_transferred)
    };
    let eta = progress
        .eta_seconds
        .map_or_else(|| "--:--".to_string(), format_eta);

    format!(
        "[{}] {:>5.1}%  {}  {}  ETA {}",
        bar,
        pct,
        amount,
        format_speed(progress.speed_bytes_per_second),
        eta
    )
}

/// Human summary of a finished session.
pub fn summary_lines(metadata: &TransferMetadata) -> Vec<String> {
    let mut lines = Vec::new();
    match metadata.outcome {
        TerminalReason::NaturalCompletion => {
            lines.push(format!(
                "Transferred {} ({})",
                metadata.display_name,
                format_size(metadata.total_bytes)
            ));
            lines.push(format!("Took {}", format_duration_ms(metadata.duration_ms)));
        }
        TerminalReason::UserStopped => {
            lines.push(format!("Stopped {}", metadata.display_name));
            if metadata.partial_bytes > 0 {
                lines.push(format!(
                    "{} had been transferred",
                    format_size(metadata.partial_bytes)
                ));
            }
        }
        TerminalReason::EngineFailure => {
            lines.push(format!("Transfer of {} failed", metadata.display_name));
            lines.push(format!(
                "{} had been transferred",
                format_size(metadata.partial_bytes)
            ));
        }
    }
    if let Some(destination) = &metadata.destination_path {
        lines.push(format!("Saved to {}", destination.display()));
    }
    lines
}

/// Format a duration in milliseconds as "1.2s" or "M:SS".
#[allow(clippy::cast_precision_loss)]
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}
