//! Transfer session controller.
//!
//! The [`SessionController`] owns one role's [`TransferSession`] and is the
//! only writer of its phase, progress and metadata. It is driven by three
//! inputs, all applied on the caller's task:
//!
//! - user commands ([`select`](SessionController::select),
//!   [`start_sharing`](SessionController::start_sharing),
//!   [`receive`](SessionController::receive),
//!   [`stop`](SessionController::stop),
//!   [`reset`](SessionController::reset))
//! - engine events, via [`handle_event`](SessionController::handle_event)
//! - results of background engine calls, via
//!   [`apply_completion`](SessionController::apply_completion)
//!
//! plus [`tick`](SessionController::tick) at [`next_deadline`](SessionController::next_deadline).
//! [`driver::run`] wires all of this to channels.
//!
//! Every state change is published as a [`SessionView`] on a watch channel,
//! and only when the view actually changed.

mod cancel;
pub mod driver;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::accumulator::ByteAccumulator;
use crate::backend::TransferBackend;
use crate::coalesce::Coalescer;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::estimate::SpeedEstimator;
use crate::event::{BackendEvent, ProgressSample};
use crate::guard::{Epoch, StopGuard};
use crate::session::{
    display_name_for_entries, display_name_for_path, entries_form_directory, Phase,
    ProgressSnapshot, ResourceKind, Role, TerminalReason, TransferMetadata, TransferSession,
};

/// Everything a presentation layer needs to draw one role's session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    /// Lifecycle state and selected resource
    pub session: TransferSession,
    /// Ticket issued by the engine (sender) or entered by the user (receiver)
    pub ticket: Option<String>,
    /// Entry names announced by the engine (receiver only)
    pub file_names: Vec<String>,
    /// Latest coalesced progress
    pub progress: ProgressSnapshot,
    /// Summary, present once completed
    pub metadata: Option<TransferMetadata>,
    /// User-facing error from the last failed command
    pub alert: Option<String>,
}

/// Result of an engine call that ran off the controller's task.
#[derive(Debug)]
pub enum Completion {
    /// `receive_file` returned
    Received {
        /// Epoch the call was issued under
        epoch: Epoch,
        /// Engine status message or error
        result: Result<String>,
    },
    /// `get_file_size` returned after a natural send completion
    SizeRefined {
        /// Epoch the call was issued under
        epoch: Epoch,
        /// Exact size or error
        result: Result<u64>,
    },
}

/// Owns one role's session and reconciles it with the engine.
pub struct SessionController {
    backend: Arc<dyn TransferBackend>,
    config: SessionConfig,
    session: TransferSession,
    ticket: Option<String>,
    file_names: Vec<String>,
    snapshot: ProgressSnapshot,
    metadata: Option<TransferMetadata>,
    alert: Option<String>,
    latest: Option<ProgressSample>,
    coalescer: Coalescer<ProgressSample>,
    accumulator: ByteAccumulator,
    estimator: SpeedEstimator,
    directory_speed: f64,
    transport_started: Option<Instant>,
    throughput_due: Option<Instant>,
    guard: StopGuard,
    view_tx: watch::Sender<SessionView>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: Option<mpsc::UnboundedReceiver<Completion>>,
}

impl SessionController {
    /// Create an idle controller for `role`.
    pub fn new(role: Role, backend: Arc<dyn TransferBackend>, config: SessionConfig) -> Self {
        let session = TransferSession::new(role);
        let (view_tx, _) = watch::channel(SessionView {
            session: session.clone(),
            ticket: None,
            file_names: Vec::new(),
            progress: ProgressSnapshot::default(),
            metadata: None,
            alert: None,
        });
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        Self {
            coalescer: Self::coalescer_for(role, &config),
            estimator: SpeedEstimator::new(config.speed_window),
            backend,
            config,
            session,
            ticket: None,
            file_names: Vec::new(),
            snapshot: ProgressSnapshot::default(),
            metadata: None,
            alert: None,
            latest: None,
            accumulator: ByteAccumulator::new(),
            directory_speed: 0.0,
            transport_started: None,
            throughput_due: None,
            guard: StopGuard::new(),
            view_tx,
            completion_tx,
            completion_rx: Some(completion_rx),
        }
    }

    fn coalescer_for(role: Role, config: &SessionConfig) -> Coalescer<ProgressSample> {
        Coalescer::new(
            config.coalesce_policy(role),
            config.replay_interval,
            config.debounce_delay,
        )
    }

    /// Which role this controller drives.
    pub const fn role(&self) -> Role {
        self.session.role
    }

    /// The engine this controller talks to.
    pub fn backend(&self) -> Arc<dyn TransferBackend> {
        Arc::clone(&self.backend)
    }

    /// Current session state.
    pub const fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Current phase.
    pub const fn phase(&self) -> Phase {
        self.session.phase
    }

    /// Latest coalesced progress.
    pub const fn progress(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Completion summary, once completed.
    pub const fn metadata(&self) -> Option<&TransferMetadata> {
        self.metadata.as_ref()
    }

    /// Ticket of the current session.
    pub fn ticket(&self) -> Option<&str> {
        self.ticket.as_deref()
    }

    /// Pending user-facing error.
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Current session epoch.
    pub const fn epoch(&self) -> Epoch {
        self.guard.epoch()
    }

    /// Build the view published to subscribers.
    pub fn view(&self) -> SessionView {
        SessionView {
            session: self.session.clone(),
            ticket: self.ticket.clone(),
            file_names: self.file_names.clone(),
            progress: self.snapshot.clone(),
            metadata: self.metadata.clone(),
            alert: self.alert.clone(),
        }
    }

    /// Watch the published view.
    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// Take the receiving end for background completions.
    ///
    /// Whoever drives the controller feeds these back through
    /// [`apply_completion`](Self::apply_completion). Returns `None` once
    /// taken.
    pub fn take_completions(&mut self) -> Option<mpsc::UnboundedReceiver<Completion>> {
        self.completion_rx.take()
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn raise_alert(&mut self, error: &Error) {
        tracing::warn!("{} command failed: {}", self.role(), error);
        self.alert = Some(error.to_string());
        self.publish();
    }

    /// Clear the pending alert.
    pub fn dismiss_alert(&mut self) {
        if self.alert.take().is_some() {
            self.publish();
        }
    }

    fn require_role(&self, role: Role) -> Result<()> {
        if self.role() == role {
            Ok(())
        } else {
            Err(Error::RoleMismatch(self.role()))
        }
    }

    /// Select the file or directory to share.
    ///
    /// A completed session is cleared first; any other non-idle phase is
    /// rejected.
    pub async fn select(&mut self, path: PathBuf) -> Result<ResourceKind> {
        self.require_role(Role::Sender)?;
        match self.phase() {
            Phase::Idle => {}
            Phase::Completed => self.clear(false),
            phase => return Err(Error::SessionActive(phase)),
        }

        match self.backend.check_path_type(&path).await {
            Ok(kind) => {
                tracing::debug!("Selected {} ({:?})", path.display(), kind);
                self.alert = None;
                self.session.resource_path = Some(path);
                self.session.resource_kind = Some(kind);
                self.publish();
                Ok(kind)
            }
            Err(e) => {
                self.raise_alert(&e);
                Err(e)
            }
        }
    }

    /// Offer the selected resource and wait for a peer.
    ///
    /// From `AwaitingPeer` or `Completed` the session restarts with the same
    /// resource, so sharing again issues a fresh ticket.
    pub async fn start_sharing(&mut self) -> Result<String> {
        self.require_role(Role::Sender)?;
        match self.phase() {
            Phase::Idle => {}
            Phase::AwaitingPeer | Phase::Completed => self.clear(true),
            Phase::Transporting => return Err(Error::SessionActive(Phase::Transporting)),
        }

        let Some(path) = self.session.resource_path.clone() else {
            let err = Error::NoResourceSelected;
            self.raise_alert(&err);
            return Err(err);
        };

        match self.backend.start_sharing(&path).await {
            Ok(ticket) => {
                self.guard.renew();
                self.alert = None;
                self.session.begin_awaiting_peer(Utc::now())?;
                tracing::info!("Sharing {} with ticket {}", path.display(), ticket);
                self.ticket = Some(ticket.clone());
                self.publish();
                Ok(ticket)
            }
            Err(e) => {
                self.raise_alert(&e);
                Err(e)
            }
        }
    }

    /// Start downloading what `ticket` points to into `output`.
    ///
    /// Enters `Transporting` immediately; the engine call runs in the
    /// background and its result comes back as a [`Completion::Received`].
    pub async fn receive(&mut self, ticket: &str, output: PathBuf) -> Result<()> {
        self.require_role(Role::Receiver)?;
        match self.phase() {
            Phase::Idle | Phase::Completed => self.clear(false),
            phase => return Err(Error::SessionActive(phase)),
        }

        let ticket = ticket.trim();
        if let Err(e) = validate_ticket(ticket) {
            self.raise_alert(&e);
            return Err(e);
        }

        let epoch = self.guard.renew();
        self.alert = None;
        self.ticket = Some(ticket.to_string());
        self.session.resource_path = Some(output.clone());
        self.enter_transporting(Instant::now())?;
        tracing::info!("Receiving {} into {}", ticket, output.display());

        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        let ticket = ticket.to_string();
        tokio::spawn(async move {
            let result = backend.receive_file(&ticket, &output).await;
            let _ = tx.send(Completion::Received { epoch, result });
        });
        Ok(())
    }

    /// Return a finished or idle session to `Idle`, forgetting everything.
    pub fn reset(&mut self) -> Result<()> {
        match self.phase() {
            Phase::Idle | Phase::Completed => {
                self.clear(false);
                self.publish();
                Ok(())
            }
            phase => Err(Error::SessionActive(phase)),
        }
    }

    /// Drop all per-session state and start a new epoch.
    fn clear(&mut self, keep_resource: bool) {
        if keep_resource {
            self.session.restart();
        } else {
            self.session.reset();
        }
        self.ticket = None;
        self.file_names.clear();
        self.snapshot = ProgressSnapshot::default();
        self.metadata = None;
        self.alert = None;
        self.latest = None;
        self.coalescer.stop();
        self.accumulator.reset();
        self.estimator.reset();
        self.directory_speed = 0.0;
        self.transport_started = None;
        self.throughput_due = None;
        self.guard.renew();
    }

    fn enter_transporting(&mut self, now: Instant) -> Result<()> {
        self.session.begin_transporting(Utc::now())?;
        self.snapshot = ProgressSnapshot::default();
        self.latest = None;
        self.accumulator.reset();
        self.estimator.reset();
        self.directory_speed = 0.0;
        self.coalescer = Self::coalescer_for(self.role(), &self.config);
        self.coalescer.start(now);
        self.transport_started = Some(now);
        self.throughput_due = Some(now + self.config.throughput_refresh);
        self.publish();
        Ok(())
    }

    /// Apply one engine event.
    ///
    /// Nothing is applied once the session is completed or stopped by the
    /// user, so late events can never overwrite the terminal state.
    pub fn handle_event(&mut self, event: BackendEvent, now: Instant) {
        if self.session.is_completed() || self.guard.is_stopped() {
            tracing::debug!("Ignoring {:?}: {} session is over", event, self.role());
            return;
        }

        match event {
            BackendEvent::Started => self.on_started(now),
            BackendEvent::Progress(sample) => self.on_progress(sample, now),
            BackendEvent::FileNames(names) => self.on_file_names(names),
            BackendEvent::Completed => self.on_finished(TerminalReason::NaturalCompletion, now),
            BackendEvent::Failed => self.on_finished(TerminalReason::EngineFailure, now),
        }
    }

    fn on_started(&mut self, now: Instant) {
        match self.phase() {
            Phase::Transporting => {
                tracing::debug!("{} transport already running", self.role());
            }
            Phase::AwaitingPeer => {
                tracing::info!("Peer connected, transfer started");
                if let Err(e) = self.enter_transporting(now) {
                    tracing::warn!("Cannot start transport: {}", e);
                }
            }
            phase => {
                tracing::warn!("Ignoring start event while {}", phase);
            }
        }
    }

    fn on_progress(&mut self, sample: ProgressSample, now: Instant) {
        if !self.session.is_transporting() {
            tracing::debug!("Ignoring progress while {}", self.phase());
            return;
        }

        let bytes = if self.session.is_directory() {
            self.accumulator.observe(sample.bytes_transferred)
        } else {
            self.estimator.push(sample.speed_bps);
            sample.bytes_transferred
        };
        let reading = ProgressSample {
            bytes_transferred: bytes,
            ..sample
        };
        self.latest = Some(reading);
        self.coalescer.record(reading, now);
    }

    fn on_file_names(&mut self, names: Vec<String>) {
        if self.role() != Role::Receiver || !self.session.is_transporting() {
            tracing::debug!("Ignoring entry names while {}", self.phase());
            return;
        }
        if self.session.resource_kind.is_none() {
            self.session.resource_kind = Some(if entries_form_directory(&names) {
                ResourceKind::Directory
            } else {
                ResourceKind::File
            });
        }
        tracing::debug!("Engine announced {} entries", names.len());
        self.file_names = names;
        self.publish();
    }

    fn on_finished(&mut self, reason: TerminalReason, now: Instant) {
        if !self.session.is_transporting() {
            tracing::debug!("Ignoring {:?} while {}", reason, self.phase());
            return;
        }

        if let Some(reading) = self.coalescer.finish() {
            self.commit(reading);
        }
        self.throughput_due = None;

        let ended_at = Utc::now();
        if let Err(e) = self.session.complete(reason, ended_at) {
            tracing::warn!("Cannot complete session: {}", e);
            return;
        }

        let duration = self
            .transport_started
            .map_or(std::time::Duration::ZERO, |started| now.duration_since(started));
        let partial_bytes = if reason == TerminalReason::EngineFailure {
            self.snapshot.bytes_transferred
        } else {
            0
        };
        let metadata = TransferMetadata {
            display_name: self.display_name(),
            total_bytes: self.estimated_total(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            started_at: self.session.started_at.unwrap_or(ended_at),
            ended_at,
            destination_path: self.destination_path(),
            was_stopped: false,
            resource_kind: self.session.resource_kind.unwrap_or(ResourceKind::File),
            outcome: reason,
            partial_bytes,
        };
        tracing::info!(
            "{} session finished ({:?}): {} bytes in {} ms",
            self.role(),
            reason,
            metadata.total_bytes,
            metadata.duration_ms
        );
        self.metadata = Some(metadata);
        self.publish();

        if reason == TerminalReason::NaturalCompletion && self.role() == Role::Sender {
            self.refine_size();
        }
    }

    /// Look up the exact size after a natural send; the estimate stays if it fails.
    fn refine_size(&self) {
        let Some(path) = self.session.resource_path.clone() else {
            return;
        };
        let epoch = self.guard.epoch();
        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = backend.get_file_size(&path).await;
            let _ = tx.send(Completion::SizeRefined { epoch, result });
        });
    }

    fn estimated_total(&self) -> u64 {
        self.latest.map_or(0, |reading| {
            if reading.total_bytes > 0 {
                reading.total_bytes
            } else {
                reading.bytes_transferred
            }
        })
    }

    fn display_name(&self) -> String {
        match self.role() {
            Role::Sender => self
                .session
                .resource_path
                .as_deref()
                .map_or_else(String::new, display_name_for_path),
            Role::Receiver => display_name_for_entries(&self.file_names),
        }
    }

    fn destination_path(&self) -> Option<PathBuf> {
        match self.role() {
            Role::Sender => None,
            Role::Receiver => self.session.resource_path.clone(),
        }
    }

    fn commit(&mut self, reading: ProgressSample) {
        let speed = if self.session.is_directory() {
            self.directory_speed
        } else {
            reading.speed_bps
        };
        self.snapshot = ProgressSnapshot::new(
            reading.bytes_transferred,
            reading.total_bytes,
            speed,
            self.estimator.average(),
        );
    }

    /// Next instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.session.is_transporting() {
            return None;
        }
        let throughput = self.throughput_due.filter(|_| self.session.is_directory());
        match (self.coalescer.deadline(), throughput) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run timed work that is due at `now`: coalesced commits and the
    /// directory throughput refresh.
    pub fn tick(&mut self, now: Instant) {
        if !self.session.is_transporting() {
            return;
        }

        let mut changed = false;
        if let Some(reading) = self.coalescer.poll(now) {
            self.commit(reading);
            changed = true;
        }

        if let Some(due) = self.throughput_due.filter(|due| *due <= now) {
            let mut next = due + self.config.throughput_refresh;
            while next <= now {
                next += self.config.throughput_refresh;
            }
            self.throughput_due = Some(next);
            if self.session.is_directory() {
                self.refresh_throughput(now);
                changed = true;
            }
        }

        if changed {
            self.publish();
        }
    }

    fn refresh_throughput(&mut self, now: Instant) {
        let Some(started) = self.transport_started else {
            return;
        };
        let observed = self.accumulator.last_observed_bytes();
        self.directory_speed = self
            .accumulator
            .throughput(observed, now.duration_since(started));
        let smoothed = self.estimator.push(self.directory_speed);
        self.snapshot = ProgressSnapshot::new(
            self.snapshot.bytes_transferred,
            self.snapshot.total_bytes,
            self.directory_speed,
            smoothed,
        );
    }

    /// Apply the result of a background engine call.
    ///
    /// Results from an earlier epoch, or from a session the user stopped,
    /// are dropped.
    pub fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Received { epoch, result } => {
                if !self.guard.is_current(epoch) {
                    tracing::debug!("Dropping stale receive result (epoch {})", epoch);
                    return;
                }
                match result {
                    Ok(message) => tracing::info!("Receive finished: {}", message),
                    Err(e) if self.session.is_transporting() => {
                        self.clear(false);
                        self.raise_alert(&e);
                    }
                    Err(e) => tracing::warn!("Receive reported an error after finishing: {}", e),
                }
            }
            Completion::SizeRefined { epoch, result } => {
                if !self.guard.is_current(epoch) {
                    tracing::debug!("Dropping stale size lookup (epoch {})", epoch);
                    return;
                }
                match result {
                    Ok(size) => {
                        if let Some(metadata) = self.metadata.as_mut().filter(|m| !m.was_stopped) {
                            tracing::debug!(
                                "Refined size {} -> {} bytes",
                                metadata.total_bytes,
                                size
                            );
                            metadata.total_bytes = size;
                            self.publish();
                        }
                    }
                    Err(e) => tracing::warn!("Keeping estimated size: {}", e),
                }
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("epoch", &self.guard.epoch())
            .field("stopped", &self.guard.is_stopped())
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

fn validate_ticket(ticket: &str) -> Result<()> {
    if ticket.is_empty() {
        return Err(Error::InvalidTicket("ticket is empty".to_string()));
    }
    if ticket.chars().any(char::is_whitespace) {
        return Err(Error::InvalidTicket(
            "ticket must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}
