//! Push channel adapter
//!
//! Typed wrapper around the backend's push transport. Raw packets are
//! parsed and validated here so the roster only ever sees well-formed
//! `SyncEvent`s.
//!
//! ## Events
//!
//! | channel event    | payload | roster event         |
//! |------------------|---------|----------------------|
//! | `visitor enters` | integer | `PresenceChanged(n)` |
//! | `visitor exits`  | integer | `PresenceChanged(n)` |
//! | `add`            | user    | `Added(user)`        |
//! | `update`         | user    | `Updated(user)`      |
//! | `delete`         | user id | `Removed(id)`        |
//!
//! ## Usage
//!
//! ```ignore
//! let mut handle = spawn_event_channel(ChannelConfig::from_config(&config));
//! while let Some(event) = handle.event_rx.recv().await {
//!     // ...
//! }
//! ```

mod client;
mod message;

pub use client::{
    socket_url, spawn_event_channel, ChannelCommand, ChannelConfig, ChannelEvent, ChannelHandle,
    ConnectionStatus,
};
pub use message::{decode_event, Frame, OpenInfo};
