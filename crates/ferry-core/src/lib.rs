//! # Ferry Core Library
//!
//! `ferry-core` is the session controller of Ferry, a ticket-based file
//! transfer front end. The transfer engine itself (ticket format, content
//! addressing, networking) sits behind the [`backend::TransferBackend`]
//! trait; this crate turns the engine's commands and noisy event feed into a
//! clean, rate-limited session model a UI can draw.
//!
//! ## Modules
//!
//! - [`session`] - Session data model and lifecycle transitions
//! - [`event`] - Engine event names, payload parsing and subscriptions
//! - [`coalesce`] - Interval-replay and trailing-debounce rate limiting
//! - [`accumulator`] - Whole-transfer byte totals for directory sessions
//! - [`estimate`] - Speed smoothing, ETA and human-readable formatting
//! - [`guard`] - Session epochs and the manual-stop guard
//! - [`controller`] - The session controller and its driver loop
//! - [`backend`] - Contract with the transfer engine
//! - [`config`] - Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_core::controller::{driver, SessionController};
//! use ferry_core::session::Role;
//!
//! let controller = SessionController::new(Role::Sender, backend, config.session);
//! let mut view = controller.subscribe_view();
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! tokio::spawn(driver::run(controller, rx));
//!
//! tx.send(UserCommand::Select("photos".into()))?;
//! tx.send(UserCommand::StartSharing)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod accumulator;
pub mod backend;
pub mod coalesce;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimate;
pub mod event;
pub mod guard;
pub mod session;

pub use controller::driver::UserCommand;
pub use controller::{Completion, SessionController, SessionView};
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
