//! Canonical user list
//!
//! The `Roster` owns the ordered list of users and the presence counter.
//! It is seeded once from a snapshot and afterwards changed only by
//! applying `SyncEvent`s, strictly in the order they arrive.
//!
//! ## Reading
//!
//! Readers never touch the roster directly. Every completed `seed` or
//! `apply` publishes an immutable `RosterView` on a watch channel:
//!
//! ```ignore
//! let mut roster = Roster::new();
//! let mut views = roster.subscribe();
//!
//! roster.seed(users);
//! roster.apply(SyncEvent::PresenceChanged(3))?;
//!
//! let view = views.borrow_and_update().clone();
//! println!("{}", view.presence_message());
//! ```

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{User, UserId};
use crate::presence::presence_message;
use crate::search;

/// A single change to the roster
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A user was created
    Added(User),
    /// A user was changed
    Updated(User),
    /// A user was deleted
    Removed(UserId),
    /// Number of connected viewers (including this one) changed
    PresenceChanged(u64),
}

impl SyncEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Added(_) => "added",
            SyncEvent::Updated(_) => "updated",
            SyncEvent::Removed(_) => "removed",
            SyncEvent::PresenceChanged(_) => "presence",
        }
    }
}

/// What to do with an update for an id that is not in the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// Leave the list unchanged and log a warning
    #[default]
    Ignore,
    /// Treat the update as an insert at the end
    Append,
    /// Return `SyncError::UnknownId`
    Reject,
}

/// What to do when an added user's id is already in the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Append anyway; the list may then hold the same id twice
    #[default]
    Keep,
    /// Replace the existing entry in place
    Replace,
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(UpdatePolicy::Ignore),
            "append" => Ok(UpdatePolicy::Append),
            "reject" => Ok(UpdatePolicy::Reject),
            other => Err(format!(
                "Invalid update policy '{}'. Use ignore, append or reject.",
                other
            )),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(DuplicatePolicy::Keep),
            "replace" => Ok(DuplicatePolicy::Replace),
            other => Err(format!(
                "Invalid duplicate policy '{}'. Use keep or replace.",
                other
            )),
        }
    }
}

/// Immutable snapshot of the roster, published after every change
#[derive(Debug, Clone, Default)]
pub struct RosterView {
    /// Users in display order
    pub users: Arc<Vec<User>>,
    /// Connected viewers, including this one
    pub presence: u64,
    /// Incremented on every change
    pub revision: u64,
    /// When the last change was applied
    pub updated_at: Option<DateTime<Utc>>,
}

impl RosterView {
    /// Users whose name contains `query`, ignoring case
    pub fn search(&self, query: &str) -> Vec<&User> {
        search::project(&self.users, query)
    }

    /// Presence line for display
    pub fn presence_message(&self) -> String {
        presence_message(self.presence)
    }
}

/// Owner of the canonical user list and presence counter
#[derive(Debug)]
pub struct Roster {
    users: Arc<Vec<User>>,
    presence: u64,
    revision: u64,
    update_policy: UpdatePolicy,
    duplicate_policy: DuplicatePolicy,
    views: watch::Sender<RosterView>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    /// Create an empty roster with default policies
    pub fn new() -> Self {
        let (views, _) = watch::channel(RosterView::default());
        Self {
            users: Arc::new(Vec::new()),
            presence: 0,
            revision: 0,
            update_policy: UpdatePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            views,
        }
    }

    /// Set how updates for unknown ids are handled
    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Set how adds for existing ids are handled
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Subscribe to published views
    pub fn subscribe(&self) -> watch::Receiver<RosterView> {
        self.views.subscribe()
    }

    /// Users in display order
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Current presence counter
    pub fn presence(&self) -> u64 {
        self.presence
    }

    /// Number of users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Whether a user with this id is in the list
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Current state as a view
    pub fn view(&self) -> RosterView {
        self.views.borrow().clone()
    }

    /// Replace the whole list with a snapshot
    pub fn seed(&mut self, users: Vec<User>) {
        debug!("Seeding roster with {} users", users.len());
        self.users = Arc::new(users);
        self.publish();
    }

    /// Apply one event
    ///
    /// Returns whether anything changed. Only `UpdatePolicy::Reject` can
    /// fail, and then the roster is left untouched.
    pub fn apply(&mut self, event: SyncEvent) -> SyncResult<bool> {
        let changed = match event {
            SyncEvent::Added(user) => self.add(user),
            SyncEvent::Updated(user) => self.update(user)?,
            SyncEvent::Removed(id) => self.remove(&id),
            SyncEvent::PresenceChanged(count) => {
                self.presence = count;
                true
            }
        };

        if changed {
            self.publish();
        }
        Ok(changed)
    }

    fn add(&mut self, user: User) -> bool {
        if self.duplicate_policy == DuplicatePolicy::Replace {
            if let Some(pos) = self.position(&user.id) {
                Arc::make_mut(&mut self.users)[pos] = user;
                return true;
            }
        }
        Arc::make_mut(&mut self.users).push(user);
        true
    }

    fn update(&mut self, user: User) -> SyncResult<bool> {
        if let Some(pos) = self.position(&user.id) {
            Arc::make_mut(&mut self.users)[pos] = user;
            return Ok(true);
        }

        match self.update_policy {
            UpdatePolicy::Ignore => {
                warn!("Ignoring update for unknown user id {}", user.id);
                Ok(false)
            }
            UpdatePolicy::Append => {
                Arc::make_mut(&mut self.users).push(user);
                Ok(true)
            }
            UpdatePolicy::Reject => Err(SyncError::UnknownId { id: user.id }),
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        Arc::make_mut(&mut self.users).retain(|u| u.id != id);
        true
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.users.iter().position(|u| u.id == id)
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.views.send_replace(RosterView {
            users: Arc::clone(&self.users),
            presence: self.presence,
            revision: self.revision,
            updated_at: Some(Utc::now()),
        });
    }
}
