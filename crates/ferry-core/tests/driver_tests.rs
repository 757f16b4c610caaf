//! Tests for the controller driver loop.
//!
//! These go through the real plumbing: commands on a channel, raw events on
//! the engine's broadcast feed, and the published view on a watch channel.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use common::{ms, Call, MockBackend, TEST_TICKET};
use ferry_core::config::SessionConfig;
use ferry_core::controller::driver;
use ferry_core::event::{
    RawEvent, RECEIVE_COMPLETED, RECEIVE_FILE_NAMES, TRANSFER_COMPLETED, TRANSFER_PROGRESS,
    TRANSFER_STARTED,
};
use ferry_core::session::{Phase, Role, TerminalReason};
use ferry_core::{SessionController, SessionView, UserCommand};

async fn wait_for(
    view: &mut watch::Receiver<SessionView>,
    what: &str,
    predicate: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    tokio::time::timeout(Duration::from_secs(10), view.wait_for(predicate))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("driver dropped the view")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn test_driver_runs_a_send() {
    let backend = MockBackend::new();
    backend.set_file_size(Ok(4096));
    let controller = SessionController::new(Role::Sender, backend.clone(), SessionConfig::default());
    let mut view = controller.subscribe_view();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(driver::run(controller, rx));

    tx.send(UserCommand::Select(PathBuf::from("/srv/report.pdf"))).unwrap();
    tx.send(UserCommand::StartSharing).unwrap();
    let shared = wait_for(&mut view, "ticket", |v| v.ticket.is_some()).await;
    assert_eq!(shared.ticket.as_deref(), Some(TEST_TICKET));
    assert_eq!(shared.session.phase, Phase::AwaitingPeer);

    backend.emit(RawEvent::bare(TRANSFER_STARTED));
    backend.emit(RawEvent::with_payload(TRANSFER_PROGRESS, "1024:4000:2048000"));
    // payloads may arrive JSON-quoted
    backend.emit(RawEvent::with_payload(TRANSFER_PROGRESS, "\"2048:4000:2048000\""));
    backend.emit(RawEvent::with_payload(TRANSFER_PROGRESS, "garbage"));

    let moving = wait_for(&mut view, "progress", |v| v.progress.bytes_transferred == 2048).await;
    assert_eq!(moving.session.phase, Phase::Transporting);
    assert!((moving.progress.speed_bytes_per_second - 2048.0).abs() < 1e-9);

    backend.emit(RawEvent::bare(TRANSFER_COMPLETED));
    let done = wait_for(&mut view, "refined size", |v| {
        v.metadata.as_ref().is_some_and(|m| m.total_bytes == 4096)
    })
    .await;
    assert_eq!(done.session.terminal_reason, Some(TerminalReason::NaturalCompletion));
    assert_eq!(done.metadata.unwrap().display_name, "report.pdf");

    tx.send(UserCommand::Shutdown).unwrap();
    let controller = handle.await.unwrap();
    assert_eq!(controller.phase(), Phase::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_driver_stop_during_receive() {
    let backend = MockBackend::new();
    let gate = backend.hold_receive();
    let controller =
        SessionController::new(Role::Receiver, backend.clone(), SessionConfig::default());
    let mut view = controller.subscribe_view();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(driver::run(controller, rx));

    tx.send(UserCommand::Receive {
        ticket: "blobticket".to_string(),
        output: PathBuf::from("/tmp/in"),
    })
    .unwrap();
    wait_for(&mut view, "transport", |v| v.session.phase == Phase::Transporting).await;

    backend.emit(RawEvent::with_payload(
        RECEIVE_FILE_NAMES,
        r#"["album/one.flac","album/two.flac"]"#,
    ));
    wait_for(&mut view, "file names", |v| v.file_names.len() == 2).await;

    tx.send(UserCommand::Stop).unwrap();
    let stopped = wait_for(&mut view, "stop", |v| v.session.phase == Phase::Completed).await;
    let metadata = stopped.metadata.unwrap();
    assert!(metadata.was_stopped);
    assert_eq!(metadata.display_name, "album");

    // late engine traffic for the stopped session changes nothing
    backend.emit(RawEvent::bare(RECEIVE_COMPLETED));
    gate.send(Err("interrupted".to_string())).unwrap();
    tokio::time::sleep(ms(200)).await;
    assert!(!view.has_changed().unwrap());

    tx.send(UserCommand::Reset).unwrap();
    let idle = wait_for(&mut view, "reset", |v| v.session.phase == Phase::Idle).await;
    assert!(idle.alert.is_none());

    drop(tx);
    handle.await.unwrap();
    assert!(backend.calls().contains(&Call::StopSharing));
}

#[tokio::test(start_paused = true)]
async fn test_driver_surfaces_command_errors_as_alerts() {
    let backend = MockBackend::new();
    let controller = SessionController::new(Role::Sender, backend.clone(), SessionConfig::default());
    let mut view = controller.subscribe_view();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(driver::run(controller, rx));

    tx.send(UserCommand::StartSharing).unwrap();
    let alerted = wait_for(&mut view, "alert", |v| v.alert.is_some()).await;
    assert_eq!(alerted.session.phase, Phase::Idle);

    tx.send(UserCommand::DismissAlert).unwrap();
    wait_for(&mut view, "dismiss", |v| v.alert.is_none()).await;

    tx.send(UserCommand::Shutdown).unwrap();
    handle.await.unwrap();
}
