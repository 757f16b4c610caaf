//! Contract with the external transfer engine.
//!
//! Ticket semantics, content addressing and the network protocol all live on
//! the other side of this trait. The controller only issues commands and
//! listens to the engine's event channel.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::event::RawEvent;
use crate::session::ResourceKind;

/// Commands and event feed exposed by a transfer engine.
///
/// Every command error is expected to be an [`Error::Backend`](crate::Error::Backend)
/// carrying the engine's message.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Offer `path` and return the ticket a receiver needs.
    async fn start_sharing(&self, path: &Path) -> Result<String>;

    /// Stop whatever the engine is currently sharing or receiving.
    async fn stop_sharing(&self) -> Result<()>;

    /// Download what `ticket` points to into `output`.
    ///
    /// Resolves when the engine is done with the download and returns its
    /// status message.
    async fn receive_file(&self, ticket: &str, output: &Path) -> Result<String>;

    /// Size in bytes of a file, or of all files under a directory.
    async fn get_file_size(&self, path: &Path) -> Result<u64>;

    /// Whether `path` is a file or a directory.
    async fn check_path_type(&self, path: &Path) -> Result<ResourceKind>;

    /// Subscribe to the engine's push events.
    fn subscribe(&self) -> broadcast::Receiver<RawEvent>;
}
