//! In-process stand-in for the transfer engine.
//!
//! The simulated engine never touches the network. Sharing enumerates the
//! selected path with `walkdir`, waits for a virtual peer and then plays the
//! transfer back as engine events, one per tick, with per-entry byte
//! counters for directories. Receiving writes a small synthetic download
//! into the output directory. `stop_sharing` cancels whatever is running.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use walkdir::WalkDir;

use ferry_core::backend::TransferBackend;
use ferry_core::event::{
    RawEvent, RECEIVE_COMPLETED, RECEIVE_FILE_NAMES, RECEIVE_STARTED, TRANSFER_COMPLETED,
    TRANSFER_STARTED,
};
use ferry_core::session::{ResourceKind, Role};
use ferry_core::{Error, Result};

/// Prefix of every ticket the simulated engine issues.
pub const TICKET_PREFIX: &str = "blob";

/// Pacing of the simulated engine.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Transfer rate in bytes per second
    pub rate: u64,
    /// Interval between progress events
    pub tick: Duration,
    /// Time until the virtual peer connects
    pub connect_delay: Duration,
    /// Entries written by a simulated download
    pub download_entries: usize,
    /// Size of each downloaded entry
    pub download_entry_size: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            rate: 8 * 1024 * 1024,
            tick: Duration::from_millis(100),
            connect_delay: Duration::from_millis(800),
            download_entries: 3,
            download_entry_size: 2 * 1024 * 1024,
        }
    }
}

/// One file of a transfer, named relative to the shared root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Name as announced to the receiver
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// Simulated transfer engine.
pub struct SimulatedBackend {
    options: SimOptions,
    events: broadcast::Sender<RawEvent>,
    cancel: Mutex<CancellationToken>,
}

impl SimulatedBackend {
    /// Create an engine with the given pacing.
    pub fn new(options: SimOptions) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            options,
            events,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_token(&self) -> CancellationToken {
        let mut guard = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        guard.cancel();
        *guard = CancellationToken::new();
        guard.clone()
    }
}

/// Enumerate the files under `path` with their sizes.
///
/// A single file yields one entry named after the file; a directory yields
/// every file below it, named `<dir>/<relative path>`.
pub fn scan_entries(path: &Path) -> std::io::Result<Vec<Entry>> {
    let root_name = path
        .file_name()
        .map_or_else(|| "shared".to_string(), |n| n.to_string_lossy().to_string());
    let mut entries = Vec::new();

    for item in WalkDir::new(path).sort_by_file_name() {
        let item = item.map_err(std::io::Error::other)?;
        if !item.file_type().is_file() {
            continue;
        }
        let size = item.metadata().map_err(std::io::Error::other)?.len();
        let name = match item.path().strip_prefix(path) {
            Ok(rel) if !rel.as_os_str().is_empty() => {
                format!("{}/{}", root_name, rel.to_string_lossy().replace('\\', "/"))
            }
            _ => root_name.clone(),
        };
        entries.push(Entry { name, size });
    }
    Ok(entries)
}

/// Emit progress for `entries` until done. Returns `false` if cancelled.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
async fn play(
    events: &broadcast::Sender<RawEvent>,
    role: Role,
    entries: &[Entry],
    options: &SimOptions,
    token: &CancellationToken,
) -> bool {
    let total: u64 = entries.iter().map(|e| e.size).sum();
    let per_tick = (options.rate as f64 * options.tick.as_secs_f64()).max(1.0) as u64;

    for entry in entries {
        let mut sent = 0u64;
        loop {
            let _ = events.send(RawEvent::progress(role, sent, total, options.rate as f64));
            if sent >= entry.size {
                break;
            }
            tokio::select! {
                () = token.cancelled() => return false,
                () = tokio::time::sleep(options.tick) => {}
            }
            sent = (sent + per_tick).min(entry.size);
        }
    }
    true
}

fn synthetic_download(ticket: &str, options: &SimOptions) -> Vec<Entry> {
    let short: String = ticket
        .trim_start_matches(TICKET_PREFIX)
        .chars()
        .take(8)
        .collect();
    (1..=options.download_entries)
        .map(|i| Entry {
            name: format!("ferry-{short}/part-{i}.bin"),
            size: options.download_entry_size,
        })
        .collect()
}

async fn write_entries(output: &Path, entries: &[Entry]) -> std::io::Result<PathBuf> {
    let mut root = output.to_path_buf();
    for (i, entry) in entries.iter().enumerate() {
        let path = output.join(&entry.name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = usize::try_from(entry.size).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, vec![0u8; size]).await?;
        if i == 0 {
            if let Some(top) = entry.name.split('/').next() {
                root = output.join(top);
            }
        }
    }
    Ok(root)
}

#[async_trait]
impl TransferBackend for SimulatedBackend {
    async fn start_sharing(&self, path: &Path) -> Result<String> {
        let entries = scan_entries(path).map_err(|e| Error::backend("start_sharing", e.to_string()))?;
        if entries.is_empty() {
            return Err(Error::backend("start_sharing", "nothing to share"));
        }

        let ticket = format!("{TICKET_PREFIX}{}", Uuid::new_v4().simple());
        let token = self.fresh_token();
        let events = self.events.clone();
        let options = self.options.clone();
        tracing::debug!("Simulating share of {} entries", entries.len());

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(options.connect_delay) => {}
            }
            let _ = events.send(RawEvent::bare(TRANSFER_STARTED));
            if play(&events, Role::Sender, &entries, &options, &token).await {
                let _ = events.send(RawEvent::bare(TRANSFER_COMPLETED));
            }
        });
        Ok(ticket)
    }

    async fn stop_sharing(&self) -> Result<()> {
        self.current_token().cancel();
        Ok(())
    }

    async fn receive_file(&self, ticket: &str, output: &Path) -> Result<String> {
        if !ticket.starts_with(TICKET_PREFIX) || ticket.len() <= TICKET_PREFIX.len() {
            return Err(Error::backend("receive_file", "unrecognized ticket"));
        }

        let token = self.fresh_token();
        let entries = synthetic_download(ticket, &self.options);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        let names = serde_json::to_string(&names)?;

        let _ = self.events.send(RawEvent::bare(RECEIVE_STARTED));
        let _ = self.events.send(RawEvent::with_payload(RECEIVE_FILE_NAMES, names));
        if !play(&self.events, Role::Receiver, &entries, &self.options, &token).await {
            return Err(Error::backend("receive_file", "receive cancelled"));
        }

        let root = write_entries(output, &entries)
            .await
            .map_err(|e| Error::backend("receive_file", e.to_string()))?;
        let _ = self.events.send(RawEvent::bare(RECEIVE_COMPLETED));
        Ok(format!("saved {} files to {}", entries.len(), root.display()))
    }

    async fn get_file_size(&self, path: &Path) -> Result<u64> {
        let path = path.to_path_buf();
        let entries = tokio::task::spawn_blocking(move || scan_entries(&path))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
            .map_err(|e| Error::backend("get_file_size", e.to_string()))?;
        Ok(entries.iter().map(|e| e.size).sum())
    }

    async fn check_path_type(&self, path: &Path) -> Result<ResourceKind> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::backend("check_path_type", format!("{}: {e}", path.display())))?;
        Ok(if metadata.is_dir() {
            ResourceKind::Directory
        } else {
            ResourceKind::File
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.events.subscribe()
    }
}
