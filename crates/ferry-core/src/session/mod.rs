//! Transfer session data model.
//!
//! A [`TransferSession`] is one send or receive operation, from selection (or
//! ticket entry) to its terminal outcome. Its phase only moves through the
//! transitions in [`lifecycle`]; everything a UI draws is derived from the
//! session plus the current [`ProgressSnapshot`] and, once completed, the
//! [`TransferMetadata`].

pub mod lifecycle;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::estimate;

/// Which side of the transfer this session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Offers a file or directory behind a ticket
    Sender,
    /// Downloads what a ticket points to
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

/// Shape of the transferred resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A single file
    File,
    /// A directory with one or more entries
    Directory,
}

impl ResourceKind {
    /// Whether progress has to be reconstructed across entries.
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing in flight
    #[default]
    Idle,
    /// Ticket issued, no peer connected yet (sender only)
    AwaitingPeer,
    /// Bytes are moving
    Transporting,
    /// Terminal; see [`TerminalReason`]
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AwaitingPeer => f.write_str("awaiting peer"),
            Self::Transporting => f.write_str("transporting"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// Why a session reached [`Phase::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The engine reported completion
    NaturalCompletion,
    /// The user stopped the transfer
    UserStopped,
    /// The engine reported a failure
    EngineFailure,
}

/// One send or receive operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSession {
    /// Side of the transfer
    pub role: Role,
    /// Selected file or directory (sender) or output directory (receiver)
    pub resource_path: Option<PathBuf>,
    /// File or directory, once known
    pub resource_kind: Option<ResourceKind>,
    /// Current lifecycle phase
    pub phase: Phase,
    /// Set only while `phase` is [`Phase::Completed`]
    pub terminal_reason: Option<TerminalReason>,
    /// When the session left `Idle`
    pub started_at: Option<DateTime<Utc>>,
    /// When the session became `Completed`
    pub ended_at: Option<DateTime<Utc>>,
}

impl TransferSession {
    /// Create an idle session for `role`.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            resource_path: None,
            resource_kind: None,
            phase: Phase::Idle,
            terminal_reason: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Whether the session has reached its terminal phase.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Whether bytes are currently moving.
    #[must_use]
    pub fn is_transporting(&self) -> bool {
        self.phase == Phase::Transporting
    }

    /// Whether the session is a directory transfer.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.resource_kind.is_some_and(ResourceKind::is_directory)
    }
}

/// Presentation-ready progress, replaced wholesale on each coalesced update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Bytes moved so far (whole transfer)
    pub bytes_transferred: u64,
    /// Total bytes, zero when unknown
    pub total_bytes: u64,
    /// Displayed speed
    pub speed_bytes_per_second: f64,
    /// Seconds left at the smoothed speed
    pub eta_seconds: Option<f64>,
}

impl ProgressSnapshot {
    /// Build a snapshot, clamping the byte count to a known total.
    ///
    /// `smoothed_speed` only feeds the ETA; the displayed speed is `speed`.
    #[must_use]
    pub fn new(bytes_transferred: u64, total_bytes: u64, speed: f64, smoothed_speed: f64) -> Self {
        let bytes_transferred = if total_bytes > 0 {
            bytes_transferred.min(total_bytes)
        } else {
            bytes_transferred
        };
        let eta_seconds = if total_bytes > 0 {
            estimate::eta_seconds(total_bytes - bytes_transferred, smoothed_speed)
        } else {
            None
        };
        Self {
            bytes_transferred,
            total_bytes,
            speed_bytes_per_second: if speed.is_finite() { speed.max(0.0) } else { 0.0 },
            eta_seconds,
        }
    }

    /// Progress in percent, zero while the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        estimate::percentage(self.bytes_transferred, self.total_bytes)
    }
}

/// Summary produced exactly once per session, when it completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    /// Name shown on the summary screen
    pub display_name: String,
    /// Total size; zero for stopped sessions
    pub total_bytes: u64,
    /// Wall time spent transporting; zero for stopped sessions
    pub duration_ms: u64,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session completed
    pub ended_at: DateTime<Utc>,
    /// Output directory (receiver only)
    pub destination_path: Option<PathBuf>,
    /// Whether the user stopped the session
    pub was_stopped: bool,
    /// File or directory
    pub resource_kind: ResourceKind,
    /// How the session ended
    pub outcome: TerminalReason,
    /// Bytes on screen when the user stopped, zero otherwise
    pub partial_bytes: u64,
}

impl TransferMetadata {
    /// Metadata for a session the user stopped mid-transfer.
    ///
    /// Totals and duration are zeroed; what had been transferred is kept in
    /// `partial_bytes`.
    #[must_use]
    pub fn stopped(
        display_name: String,
        resource_kind: ResourceKind,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        destination_path: Option<PathBuf>,
        partial_bytes: u64,
    ) -> Self {
        Self {
            display_name,
            total_bytes: 0,
            duration_ms: 0,
            started_at,
            ended_at,
            destination_path,
            was_stopped: true,
            resource_kind,
            outcome: TerminalReason::UserStopped,
            partial_bytes,
        }
    }
}

/// Name for a sender-side resource: the final path component.
pub fn display_name_for_path(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().to_string(),
    )
}

/// Name for a receiver-side download from the engine's entry list.
///
/// A single entry shows its file name, entries sharing a parent directory
/// show the deepest shared directory, anything else shows a count.
pub fn display_name_for_entries(names: &[String]) -> String {
    match names {
        [] => "download".to_string(),
        [single] => display_name_for_path(Path::new(single)),
        _ => common_parent(names).unwrap_or_else(|| format!("{} files", names.len())),
    }
}

/// Whether an entry list describes a directory transfer.
pub fn entries_form_directory(names: &[String]) -> bool {
    names.len() > 1 || names.iter().any(|n| n.contains(['/', '\\']))
}

fn common_parent(names: &[String]) -> Option<String> {
    let split: Vec<Vec<String>> = names
        .iter()
        .map(|n| {
            Path::new(n)
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .collect();

    let first = split.first()?;
    let mut shared = split.iter().map(|c| c.len().saturating_sub(1)).min()?;
    for other in &split[1..] {
        shared = first
            .iter()
            .zip(other)
            .take(shared)
            .take_while(|(a, b)| a == b)
            .count();
    }
    shared.checked_sub(1).map(|last| first[last].clone())
}
