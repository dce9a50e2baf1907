//! Push channel connection
//!
//! Maintains a long-lived WebSocket connection to the backend's push
//! channel and forwards decoded events in arrival order.
//! Handles reconnection automatically with exponential backoff.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::message::{decode_event, Frame, OpenInfo};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::roster::SyncEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// How long to wait for the server to finish the handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands sent to the channel task
#[derive(Debug, Clone)]
pub enum ChannelCommand {
    /// Close the connection and stop reconnecting
    Shutdown,
}

/// Events emitted by the channel task
#[derive(Debug)]
pub enum ChannelEvent {
    /// Handshake finished, events will follow
    Connected,
    /// Connection lost; a reconnect is scheduled
    Disconnected,
    /// A roster event, in arrival order
    Event(SyncEvent),
    /// An event arrived but its payload was invalid
    Malformed(SyncError),
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and receiving events
    Connected,
}

/// Handle to control the channel task
pub struct ChannelHandle {
    /// Send commands to the channel task
    pub command_tx: mpsc::Sender<ChannelCommand>,
    /// Receive events from the channel task
    pub event_rx: mpsc::Receiver<ChannelEvent>,
    /// Watch connection status
    pub status_rx: watch::Receiver<ConnectionStatus>,
}

impl ChannelHandle {
    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Ask the channel task to stop
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(ChannelCommand::Shutdown).await;
    }
}

/// Configuration for the channel task
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket URL including the Socket.IO path
    pub url: String,
    /// Capacity of the event buffer
    ///
    /// When it is full the task stops reading from the socket until the
    /// consumer catches up. Events are never dropped.
    pub event_buffer: usize,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            event_buffer: 256,
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl ChannelConfig {
    /// Build from application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: socket_url(config.event_base_url()),
            event_buffer: config.event_buffer.max(1),
            initial_reconnect_delay: config.reconnect_initial_delay(),
            max_reconnect_delay: config.reconnect_max_delay(),
        }
    }
}

/// WebSocket URL of the push channel for a server base URL
///
/// `http`/`https` become `ws`/`wss`. The Socket.IO path is appended unless
/// the URL already names it.
pub fn socket_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };

    if base.contains("/socket.io") {
        base
    } else {
        format!("{}/socket.io/?EIO=4&transport=websocket", base)
    }
}

/// Spawn the channel task
///
/// Returns a handle to control and monitor it. The task reconnects on its
/// own until it is shut down or the event receiver is dropped.
pub fn spawn_event_channel(config: ChannelConfig) -> ChannelHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

    tokio::spawn(channel_task_loop(config, command_rx, event_tx, status_tx));

    ChannelHandle {
        command_tx,
        event_rx,
        status_rx,
    }
}

/// Exponential reconnect delay
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following one doubles up to `max`
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Main channel loop with reconnection
async fn channel_task_loop(
    config: ChannelConfig,
    mut command_rx: mpsc::Receiver<ChannelCommand>,
    event_tx: mpsc::Sender<ChannelEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    let mut backoff = Backoff::new(config.initial_reconnect_delay, config.max_reconnect_delay);

    loop {
        status_tx.send_replace(ConnectionStatus::Connecting);

        let result = connect_and_listen(&config, &mut command_rx, &event_tx, &status_tx).await;
        let was_connected = *status_tx.borrow() == ConnectionStatus::Connected;

        // A connection that got through the handshake starts the backoff over,
        // however it ended
        if was_connected {
            backoff.reset();
        }

        match result {
            Ok(true) => break,
            Ok(false) => debug!("Event channel closed"),
            Err(e) => warn!("Event channel error: {}", e),
        }

        status_tx.send_replace(ConnectionStatus::Disconnected);
        if was_connected && event_tx.send(ChannelEvent::Disconnected).await.is_err() {
            break;
        }

        let delay = backoff.next_delay();
        debug!("Reconnecting to {} in {:?}", config.url, delay);

        // Wait before reconnecting, but check for shutdown command
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            cmd = command_rx.recv() => {
                if matches!(cmd, Some(ChannelCommand::Shutdown) | None) {
                    break;
                }
            }
            _ = event_tx.closed() => break,
        }
    }

    status_tx.send_replace(ConnectionStatus::Disconnected);
    debug!("Event channel task stopped");
}

/// Connect and forward events until disconnection or shutdown
///
/// Returns `Ok(true)` when the task should stop.
async fn connect_and_listen(
    config: &ChannelConfig,
    command_rx: &mut mpsc::Receiver<ChannelCommand>,
    event_tx: &mpsc::Sender<ChannelEvent>,
    status_tx: &watch::Sender<ConnectionStatus>,
) -> SyncResult<bool> {
    debug!("Connecting to {}", config.url);
    let (ws_stream, _response) = connect_async(config.url.as_str())
        .await
        .map_err(|e| SyncError::Channel(format!("connect to {} failed: {}", config.url, e)))?;
    let (mut write, mut read) = ws_stream.split();

    let Some(open) = handshake(&mut write, &mut read).await? else {
        return Ok(false);
    };
    let liveness = open.liveness_timeout();

    info!("Connected to event channel at {}", config.url);
    status_tx.send_replace(ConnectionStatus::Connected);
    if event_tx.send(ChannelEvent::Connected).await.is_err() {
        return Ok(true);
    }

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                if matches!(cmd, Some(ChannelCommand::Shutdown) | None) {
                    let _ = send_frame(&mut write, &Frame::Disconnect).await;
                    write.close().await.ok();
                    return Ok(true);
                }
            }

            msg = tokio::time::timeout(liveness, read.next()) => {
                let Ok(msg) = msg else {
                    return Err(SyncError::Channel(format!(
                        "no packet from server in {:?}, assuming it is gone",
                        liveness
                    )));
                };
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match Frame::parse(&text) {
                            Ok(Frame::Event { name, payload }) => {
                                let forwarded = match decode_event(&name, payload) {
                                    Ok(Some(event)) => ChannelEvent::Event(event),
                                    Ok(None) => {
                                        debug!("Ignoring '{}' event", name);
                                        continue;
                                    }
                                    Err(e) => {
                                        warn!("{}", e);
                                        ChannelEvent::Malformed(e)
                                    }
                                };
                                // Blocks while the buffer is full
                                if event_tx.send(forwarded).await.is_err() {
                                    write.close().await.ok();
                                    return Ok(true);
                                }
                            }
                            Ok(Frame::Ping) => send_frame(&mut write, &Frame::Pong).await?,
                            Ok(Frame::Disconnect) | Ok(Frame::Close) => {
                                info!("Server closed the event channel");
                                return Ok(false);
                            }
                            Ok(_) => {}
                            Err(e) if e.is_malformed() => {
                                warn!("{}", e);
                                if event_tx.send(ChannelEvent::Malformed(e)).await.is_err() {
                                    return Ok(true);
                                }
                            }
                            Err(e) => debug!("Skipping packet: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(false),
                    Some(Err(e)) => {
                        return Err(SyncError::Channel(format!("WebSocket error: {}", e)));
                    }
                    _ => {
                        // Binary/ping/pong - ignore
                    }
                }
            }
        }
    }
}

/// Run the open/connect exchange
///
/// Returns the transport's open data, or `None` if the server closed the
/// connection first.
async fn handshake(write: &mut WsWrite, read: &mut WsRead) -> SyncResult<Option<OpenInfo>> {
    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    let mut open = OpenInfo::default();

    loop {
        let msg = tokio::time::timeout_at(deadline, read.next())
            .await
            .map_err(|_| SyncError::Channel("timed out waiting for handshake".to_string()))?;

        match msg {
            Some(Ok(Message::Text(text))) => match Frame::parse(&text)? {
                Frame::Open(info) => {
                    debug!("Transport open, sid={}", info.sid);
                    open = info;
                    send_frame(write, &Frame::Connect).await?;
                }
                Frame::Connect => return Ok(Some(open)),
                Frame::ConnectError(message) => {
                    return Err(SyncError::Channel(format!(
                        "server refused connection: {}",
                        message
                    )));
                }
                Frame::Ping => send_frame(write, &Frame::Pong).await?,
                Frame::Close | Frame::Disconnect => return Ok(None),
                _ => {}
            },
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Err(e)) => {
                return Err(SyncError::Channel(format!("WebSocket error: {}", e)));
            }
            _ => {}
        }
    }
}

async fn send_frame(write: &mut WsWrite, frame: &Frame) -> SyncResult<()> {
    write
        .send(Message::Text(frame.encode()))
        .await
        .map_err(|e| SyncError::Channel(format!("send failed: {}", e)))
}
