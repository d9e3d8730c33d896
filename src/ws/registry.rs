//! Per-player connection tracking
//!
//! A [`ConnectionHandle`] is a cheap clone around the connection's outbound
//! channel plus a shared open/closed flag. The registry owns the canonical
//! map; rooms and the matchmaking queue hold non-owning clones and check
//! liveness at every send, mirroring a `readyState` probe.

use crate::error::{Result, SessionError};
use crate::types::PlayerId;
use crate::ws::messages::{encode_event, ServerEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Frame queued for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// A serialized event envelope to deliver as a text frame
    Event(String),
    /// Close the connection with the given code and reason
    Close { code: u16, reason: String },
}

/// Non-owning handle to one player's live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    player_id: PlayerId,
    tx: UnboundedSender<OutboundFrame>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains.
    ///
    /// Tests use the receiver directly to observe outbound traffic.
    pub fn channel(player_id: impl Into<PlayerId>) -> (Self, UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            player_id: player_id.into(),
            tx,
            open: Arc::new(AtomicBool::new(true)),
        };
        (handle, rx)
    }

    /// The player this connection belongs to
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Whether the connection is still live
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Fire-and-forget delivery of an event.
    ///
    /// Serialization failures are logged and dropped; a dead channel marks
    /// the handle closed so later liveness checks skip it.
    pub fn send(&self, event: &ServerEvent) {
        let json = match encode_event(event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Dropping {} event for {}: {}", event.cmd(), self.player_id, e);
                return;
            }
        };

        if self.tx.send(OutboundFrame::Event(json)).is_err() {
            debug!(
                "Writer for player {} is gone, marking connection closed",
                self.player_id
            );
            self.mark_closed();
        }
    }

    /// Ask the writer task to close the connection, then treat it as dead
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        });
        self.mark_closed();
    }

    /// Flag the connection as no longer usable for sends
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Registry of live connections, keyed by player id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<PlayerId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection; an existing entry for the same player is
    /// replaced and its socket closed out from under it.
    pub fn register(&self, handle: ConnectionHandle) -> Result<()> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| SessionError::InternalError {
                message: "Failed to acquire connections lock".to_string(),
            })?;

        if let Some(previous) = connections.insert(handle.player_id().to_string(), handle) {
            warn!(
                "Player {} reconnected, dropping previous connection",
                previous.player_id()
            );
            previous.mark_closed();
        }

        Ok(())
    }

    /// Stop tracking a player's connection
    pub fn remove(&self, player_id: &str) -> Result<Option<ConnectionHandle>> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| SessionError::InternalError {
                message: "Failed to acquire connections lock".to_string(),
            })?;

        Ok(connections.remove(player_id))
    }

    /// Look up a player's connection
    pub fn get(&self, player_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .read()
            .ok()
            .and_then(|connections| connections.get(player_id).cloned())
    }

    /// Number of tracked connections
    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .map(|connections| connections.len())
            .unwrap_or(0)
    }
}
