//! rollcall Core Library
//!
//! This crate keeps a list of user records in sync with a backend: a bulk
//! snapshot seeds the list, and a push channel streams incremental changes
//! and the number of connected viewers.
//!
//! # Architecture
//!
//! ```text
//! SnapshotLoader --seed--> Roster <--apply-- EventChannel
//!                            |
//!                       RosterView (watch)
//!                            |
//!                 search::project / presence
//! ```
//!
//! The `Session` owns the `Roster` and is its only writer. Readers receive
//! immutable `RosterView`s.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut handle = Session::new(config)?.spawn();
//!
//! while handle.views.changed().await.is_ok() {
//!     let view = handle.views.borrow_and_update().clone();
//!     for user in view.search("ann") {
//!         println!("{}", user.name);
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - `roster`: Canonical list, events and change notification
//! - `channel`: Push channel adapter (wire format, validation, reconnects)
//! - `snapshot`: Bulk load from the REST endpoint
//! - `session`: Drives snapshot and channel into the roster
//! - `search`: Name filter
//! - `presence`: Presence line formatting
//! - `models`: User record
//! - `config`: Application configuration

pub mod channel;
pub mod config;
pub mod error;
pub mod models;
pub mod presence;
pub mod roster;
pub mod search;
pub mod session;
pub mod snapshot;

pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use models::{User, UserId};
pub use presence::{presence_message, Presence};
pub use roster::{DuplicatePolicy, Roster, RosterView, SyncEvent, UpdatePolicy};
pub use search::project;
pub use session::{Session, SessionEvent, SessionHandle};
pub use snapshot::SnapshotLoader;
