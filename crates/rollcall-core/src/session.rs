//! Live session
//!
//! A session owns the roster and is the only thing that writes to it.
//! It loads the snapshot, then starts the push channel and applies its
//! events one at a time, in the order they arrive.
//!
//! After a reconnect the snapshot is loaded again. The channel keeps
//! buffering while that request is in flight, and the snapshot may already
//! contain what those buffered events describe. They are therefore applied
//! with [`Session::apply_reconciled`], which turns an add for an id already
//! in the list into an in-place update.
//!
//! ## Usage
//!
//! ```ignore
//! let mut handle = Session::new(config)?.spawn();
//! while handle.views.changed().await.is_ok() {
//!     let view = handle.views.borrow_and_update().clone();
//!     println!("{}", view.presence_message());
//! }
//! ```

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{spawn_event_channel, ChannelConfig, ChannelEvent};
use crate::config::Config;
use crate::error::SyncResult;
use crate::roster::{Roster, RosterView, SyncEvent};
use crate::snapshot::SnapshotLoader;

/// Events emitted by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Snapshot loaded and the roster reseeded
    SnapshotLoaded { users: usize },
    /// Snapshot could not be loaded; the roster kept its previous contents
    SnapshotFailed(String),
    /// Push channel connected
    Connected,
    /// Push channel lost
    Disconnected,
    /// An event was dropped because it was malformed or could not be applied
    EventRejected(String),
}

/// Capacity of the session event queue
///
/// Events are notifications only. When nobody drains the queue the newest
/// ones are dropped; the roster itself is unaffected.
pub const SESSION_EVENT_BUFFER: usize = 64;

/// Handle to a spawned session
pub struct SessionHandle {
    /// Roster views, updated after every change
    pub views: watch::Receiver<RosterView>,
    /// Session events, bounded by [`SESSION_EVENT_BUFFER`]
    pub events: mpsc::Receiver<SessionEvent>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Stop the session and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Single owner of the roster for the lifetime of a viewing session
pub struct Session {
    config: Config,
    loader: SnapshotLoader,
    roster: Roster,
    /// Set when the channel drops, cleared on the next snapshot attempt
    needs_resync: bool,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
}

impl Session {
    /// Create a session from configuration
    pub fn new(config: Config) -> SyncResult<Self> {
        let loader = SnapshotLoader::from_config(&config)?;
        let roster = Roster::new()
            .with_update_policy(config.update_policy)
            .with_duplicate_policy(config.duplicate_policy);
        let (event_tx, event_rx) = mpsc::channel(SESSION_EVENT_BUFFER);

        Ok(Self {
            config,
            loader,
            roster,
            needs_resync: false,
            event_tx,
            event_rx: Some(event_rx),
        })
    }

    /// Load the snapshot once and return it, without connecting the channel
    ///
    /// Unlike a running session, a failed load is returned to the caller.
    pub async fn load_once(config: &Config) -> SyncResult<RosterView> {
        let loader = SnapshotLoader::from_config(config)?;
        let mut roster = Roster::new();
        roster.seed(loader.fetch().await?);
        Ok(roster.view())
    }

    /// The roster owned by this session
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Subscribe to roster views
    pub fn subscribe(&self) -> watch::Receiver<RosterView> {
        self.roster.subscribe()
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Run the session on a background task
    pub fn spawn(mut self) -> SessionHandle {
        let views = self.subscribe();
        let events = self.take_events().unwrap_or_else(|| {
            // Events were taken earlier; hand out a receiver that stays empty
            mpsc::channel(1).1
        });
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });

        SessionHandle {
            views,
            events,
            shutdown_tx,
            task,
        }
    }

    /// Load the snapshot, then apply channel events until shut down
    ///
    /// Stops when `shutdown_rx` yields or is closed.
    pub async fn run(&mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        self.load_snapshot().await;

        let mut channel = spawn_event_channel(ChannelConfig::from_config(&self.config));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    channel.shutdown().await;
                    break;
                }
                event = channel.event_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if self.handle_channel_event(event).await {
                        self.reconcile_buffered(&mut channel.event_rx).await;
                    }
                }
            }
        }

        info!("Session stopped");
    }

    /// Fetch the snapshot and reseed
    ///
    /// A failure is logged and reported as a session event; the roster keeps
    /// whatever it held before. Returns whether the roster was reseeded.
    pub async fn load_snapshot(&mut self) -> bool {
        self.needs_resync = false;

        match self.loader.fetch().await {
            Ok(users) => {
                let count = users.len();
                self.roster.seed(users);
                self.emit(SessionEvent::SnapshotLoaded { users: count });
                true
            }
            Err(e) => {
                warn!("Snapshot load failed, keeping current list: {}", e);
                self.emit(SessionEvent::SnapshotFailed(e.to_string()));
                false
            }
        }
    }

    /// Apply one event from the channel
    ///
    /// Returns whether a reconnect just reseeded the roster. In that case
    /// whatever the channel buffered during the reload should go through
    /// [`Session::apply_reconciled`].
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Connected => {
                self.emit(SessionEvent::Connected);
                if self.needs_resync && self.config.resync_on_reconnect {
                    info!("Reconnected, reloading snapshot");
                    return self.load_snapshot().await;
                }
            }
            ChannelEvent::Disconnected => {
                self.needs_resync = true;
                self.emit(SessionEvent::Disconnected);
            }
            ChannelEvent::Event(event) => self.apply_event(event),
            ChannelEvent::Malformed(e) => {
                debug!("Skipping malformed event: {}", e);
                self.emit(SessionEvent::EventRejected(e.to_string()));
            }
        }
        false
    }

    /// Apply an event that may already be part of a fresh snapshot
    ///
    /// An add for an id the roster holds becomes an update in place, so the
    /// record is not listed twice. Everything else is applied as usual.
    pub fn apply_reconciled(&mut self, event: SyncEvent) {
        let event = match event {
            SyncEvent::Added(user) if self.roster.contains(&user.id) => {
                debug!("Add for '{}' already in snapshot, updating in place", user.id);
                SyncEvent::Updated(user)
            }
            other => other,
        };
        self.apply_event(event);
    }

    /// Drain what the channel buffered while the snapshot was reloading
    async fn reconcile_buffered(&mut self, event_rx: &mut mpsc::Receiver<ChannelEvent>) {
        while let Ok(event) = event_rx.try_recv() {
            match event {
                ChannelEvent::Event(event) => self.apply_reconciled(event),
                other => {
                    self.handle_channel_event(other).await;
                }
            }
        }
    }

    fn apply_event(&mut self, event: SyncEvent) {
        let kind = event.kind();
        match self.roster.apply(event) {
            Ok(changed) => debug!("Applied {} event, changed={}", kind, changed),
            Err(e) => {
                warn!("Rejected {} event: {}", kind, e);
                self.emit(SessionEvent::EventRejected(e.to_string()));
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            debug!("Session event queue full, dropping {:?}", event);
        }
    }
}
