//! Backend push events.
//!
//! The engine announces progress through named events carrying a compact
//! payload. This module validates them at the boundary and turns them into
//! a typed [`BackendEvent`]:
//!
//! | Event | Payload |
//! |-------|---------|
//! | `transfer-started` / `receive-started` | none |
//! | `transfer-progress` / `receive-progress` | `"<bytes>:<total>:<speed * 1000>"` |
//! | `receive-file-names` | JSON list of path strings |
//! | `transfer-completed` / `receive-completed` | none |
//! | `transfer-failed` | none |
//!
//! Payloads may arrive bare or wrapped in a JSON string, the way webview
//! event bridges serialize them.

pub mod subscription;

pub use subscription::EventSubscription;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::Role;

/// Sender started transporting
pub const TRANSFER_STARTED: &str = "transfer-started";
/// Sender progress sample
pub const TRANSFER_PROGRESS: &str = "transfer-progress";
/// Sender finished
pub const TRANSFER_COMPLETED: &str = "transfer-completed";
/// Sender failed
pub const TRANSFER_FAILED: &str = "transfer-failed";
/// Receiver started transporting
pub const RECEIVE_STARTED: &str = "receive-started";
/// Receiver progress sample
pub const RECEIVE_PROGRESS: &str = "receive-progress";
/// Receiver entry names
pub const RECEIVE_FILE_NAMES: &str = "receive-file-names";
/// Receiver finished
pub const RECEIVE_COMPLETED: &str = "receive-completed";

const SPEED_SCALE: f64 = 1000.0;

/// An event as delivered by the engine, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event name
    pub name: String,
    /// Serialized payload, if any
    pub payload: Option<String>,
}

impl RawEvent {
    /// An event without payload.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    /// An event with a payload.
    pub fn with_payload(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload.into()),
        }
    }

    /// A progress event for `role` in the engine's wire format.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn progress(role: Role, bytes: u64, total: u64, speed_bps: f64) -> Self {
        let name = match role {
            Role::Sender => TRANSFER_PROGRESS,
            Role::Receiver => RECEIVE_PROGRESS,
        };
        let scaled = (speed_bps.max(0.0) * SPEED_SCALE).round() as u64;
        Self::with_payload(name, format!("{bytes}:{total}:{scaled}"))
    }
}

/// One raw progress sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Bytes reported by the engine (per entry for directories)
    pub bytes_transferred: u64,
    /// Total reported by the engine, zero when unknown
    pub total_bytes: u64,
    /// Engine-reported instantaneous speed
    pub speed_bps: f64,
}

impl ProgressSample {
    /// Parse `"<bytes>:<total>:<speed * 1000>"`.
    pub fn parse(payload: &str) -> std::result::Result<Self, String> {
        let mut parts = payload.trim().split(':');
        let mut field = |name: &str| -> std::result::Result<u64, String> {
            let raw = parts.next().ok_or_else(|| format!("missing {name}"))?;
            raw.trim()
                .parse::<u64>()
                .map_err(|e| format!("bad {name} '{raw}': {e}"))
        };

        let bytes_transferred = field("bytes")?;
        let total_bytes = field("total")?;
        let scaled_speed = field("speed")?;
        if parts.next().is_some() {
            return Err("too many fields".to_string());
        }

        Ok(Self {
            bytes_transferred,
            total_bytes,
            speed_bps: scaled_speed as f64 / SPEED_SCALE,
        })
    }
}

/// A validated backend event.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The session entered transport
    Started,
    /// Raw progress sample
    Progress(ProgressSample),
    /// Entry names of a directory transfer
    FileNames(Vec<String>),
    /// Natural completion
    Completed,
    /// Engine-reported failure
    Failed,
}

impl BackendEvent {
    /// Validate `raw` for a controller of `role`.
    ///
    /// Returns `Ok(None)` for events outside the role's subscription and
    /// [`Error::MalformedPayload`] when a payload does not parse.
    pub fn parse(role: Role, raw: &RawEvent) -> Result<Option<Self>> {
        let event = match (role, raw.name.as_str()) {
            (Role::Sender, TRANSFER_STARTED) | (Role::Receiver, RECEIVE_STARTED) => Self::Started,
            (Role::Sender, TRANSFER_PROGRESS) | (Role::Receiver, RECEIVE_PROGRESS) => {
                let payload = unwrap_payload(raw)?;
                let sample = ProgressSample::parse(&payload).map_err(|reason| {
                    Error::MalformedPayload {
                        event: raw.name.clone(),
                        reason,
                    }
                })?;
                Self::Progress(sample)
            }
            (Role::Receiver, RECEIVE_FILE_NAMES) => {
                let payload = unwrap_payload(raw)?;
                let names: Vec<String> =
                    serde_json::from_str(&payload).map_err(|e| Error::MalformedPayload {
                        event: raw.name.clone(),
                        reason: e.to_string(),
                    })?;
                Self::FileNames(names)
            }
            (Role::Sender, TRANSFER_COMPLETED) | (Role::Receiver, RECEIVE_COMPLETED) => {
                Self::Completed
            }
            (Role::Sender, TRANSFER_FAILED) => Self::Failed,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn unwrap_payload(raw: &RawEvent) -> Result<String> {
    let payload = raw
        .payload
        .as_deref()
        .ok_or_else(|| Error::MalformedPayload {
            event: raw.name.clone(),
            reason: "missing payload".to_string(),
        })?
        .trim();

    if payload.starts_with('"') {
        serde_json::from_str::<String>(payload).map_err(|e| Error::MalformedPayload {
            event: raw.name.clone(),
            reason: e.to_string(),
        })
    } else {
        Ok(payload.to_string())
    }
}
