//! Common test utilities for `Ferry` integration tests.
//!
//! [`MockBackend`] stands in for the transfer engine: it records every
//! command, lets a test script failures, and pushes events through the same
//! broadcast channel a real engine would use.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use ferry_core::backend::TransferBackend;
use ferry_core::config::SessionConfig;
use ferry_core::event::RawEvent;
use ferry_core::session::{ResourceKind, Role};
use ferry_core::{Completion, Error, Result, SessionController};

/// Ticket returned by a successful `start_sharing`.
pub const TEST_TICKET: &str = "blobaaaq2f7ticket";

/// One recorded engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartSharing(PathBuf),
    StopSharing,
    ReceiveFile(String, PathBuf),
    GetFileSize(PathBuf),
    CheckPathType(PathBuf),
}

type ReceiveGate = oneshot::Receiver<std::result::Result<String, String>>;

/// Scriptable in-memory engine.
pub struct MockBackend {
    events: broadcast::Sender<RawEvent>,
    calls: Mutex<Vec<Call>>,
    start_error: Mutex<Option<String>>,
    stop_error: Mutex<Option<String>>,
    file_size: Mutex<std::result::Result<u64, String>>,
    receive_gate: Mutex<Option<ReceiveGate>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            events,
            calls: Mutex::new(Vec::new()),
            start_error: Mutex::new(None),
            stop_error: Mutex::new(None),
            file_size: Mutex::new(Ok(0)),
            receive_gate: Mutex::new(None),
        })
    }

    /// Push a raw event to every subscriber.
    pub fn emit(&self, event: RawEvent) {
        let _ = self.events.send(event);
    }

    /// Commands issued so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times `stop_sharing` was called.
    pub fn stop_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::StopSharing))
            .count()
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_stop(&self, message: &str) {
        *self.stop_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_file_size(&self, result: std::result::Result<u64, String>) {
        *self.file_size.lock().unwrap() = result;
    }

    /// Make the next `receive_file` wait until the returned sender fires.
    pub fn hold_receive(&self) -> oneshot::Sender<std::result::Result<String, String>> {
        let (tx, rx) = oneshot::channel();
        *self.receive_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TransferBackend for MockBackend {
    async fn start_sharing(&self, path: &Path) -> Result<String> {
        self.record(Call::StartSharing(path.to_path_buf()));
        match self.start_error.lock().unwrap().clone() {
            Some(message) => Err(Error::backend("start_sharing", message)),
            None => Ok(TEST_TICKET.to_string()),
        }
    }

    async fn stop_sharing(&self) -> Result<()> {
        self.record(Call::StopSharing);
        match self.stop_error.lock().unwrap().clone() {
            Some(message) => Err(Error::backend("stop_sharing", message)),
            None => Ok(()),
        }
    }

    async fn receive_file(&self, ticket: &str, output: &Path) -> Result<String> {
        self.record(Call::ReceiveFile(ticket.to_string(), output.to_path_buf()));
        let gate = self.receive_gate.lock().unwrap().take();
        let outcome = match gate {
            Some(gate) => gate.await.unwrap_or_else(|_| Err("gate dropped".to_string())),
            None => Ok("received".to_string()),
        };
        outcome.map_err(|message| Error::backend("receive_file", message))
    }

    async fn get_file_size(&self, path: &Path) -> Result<u64> {
        self.record(Call::GetFileSize(path.to_path_buf()));
        self.file_size
            .lock()
            .unwrap()
            .clone()
            .map_err(|message| Error::backend("get_file_size", message))
    }

    async fn check_path_type(&self, path: &Path) -> Result<ResourceKind> {
        self.record(Call::CheckPathType(path.to_path_buf()));
        let name = path.to_string_lossy();
        if name.contains("missing") {
            Err(Error::backend("check_path_type", "path does not exist"))
        } else if path.extension().is_some() {
            Ok(ResourceKind::File)
        } else {
            Ok(ResourceKind::Directory)
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.events.subscribe()
    }
}

/// A controller wired to a fresh mock, plus its completion feed.
pub fn controller(
    role: Role,
    config: SessionConfig,
) -> (
    SessionController,
    Arc<MockBackend>,
    mpsc::UnboundedReceiver<Completion>,
) {
    let backend = MockBackend::new();
    let mut controller = SessionController::new(role, backend.clone(), config);
    let completions = controller
        .take_completions()
        .expect("completions not taken yet");
    (controller, backend, completions)
}

/// Wait for the next background completion.
pub async fn next_completion(rx: &mut mpsc::UnboundedReceiver<Completion>) -> Completion {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a completion")
        .expect("completion channel closed")
}

/// Milliseconds as a `Duration`.
pub const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
