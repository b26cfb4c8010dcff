//! Session registry: room membership for live connections.
//!
//! DESIGN
//! ======
//! Each websocket connection registers an outbound queue under a
//! `ConnectionId`. Connections then join any number of session rooms. The
//! registry keeps both directions (room → members, connection → rooms) so a
//! disconnect removes every membership in one step.
//!
//! All mutations happen under one `std::sync::RwLock` that is never held
//! across an `.await`. Broadcasts copy the member senders out under the read
//! lock and deliver after releasing it, so a publish sees a consistent
//! snapshot: a connection joining after the snapshot misses that one event.
//!
//! Delivery is best-effort `try_send`; a full or closed queue is skipped and
//! logged rather than blocking the publisher.
//!
//! Nothing here is persisted. A restart drops all membership and clients
//! rejoin on reconnect.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::ServerEvent;

// =============================================================================
// TYPES
// =============================================================================

/// Identity of one live websocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Who receives a room broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every room member.
    Room,
    /// Every room member, plus the origin even if it never joined the room.
    RoomAndOrigin(ConnectionId),
    /// Every room member except the origin.
    RoomExcept(ConnectionId),
}

#[derive(Default)]
struct Inner {
    /// Outbound queue per registered connection.
    connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    /// Session id -> joined connections.
    rooms: HashMap<Uuid, HashSet<ConnectionId>>,
    /// Connection -> joined session ids.
    memberships: HashMap<ConnectionId, HashSet<Uuid>>,
}

/// Shared room-membership map. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the maps half-updated
    // (each mutation is a single insert/remove), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection's outbound queue.
    pub fn connect(&self, conn: ConnectionId, tx: mpsc::Sender<ServerEvent>) {
        self.write().connections.insert(conn, tx);
    }

    /// Add `conn` to room `session_id`. Returns `false` if it was already a
    /// member. The session is not checked against storage.
    pub fn join(&self, conn: ConnectionId, session_id: Uuid) -> bool {
        let mut inner = self.write();
        let added = inner.rooms.entry(session_id).or_default().insert(conn);
        inner.memberships.entry(conn).or_default().insert(session_id);
        added
    }

    /// Remove `conn` from room `session_id`. Returns `false` if it was not a
    /// member.
    pub fn leave(&self, conn: ConnectionId, session_id: Uuid) -> bool {
        let mut inner = self.write();
        let removed = match inner.rooms.get_mut(&session_id) {
            Some(members) => {
                let removed = members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(&session_id);
                }
                removed
            }
            None => false,
        };
        if let Some(joined) = inner.memberships.get_mut(&conn) {
            joined.remove(&session_id);
            if joined.is_empty() {
                inner.memberships.remove(&conn);
            }
        }
        removed
    }

    /// Forget `conn` entirely: its queue and every room it joined. Returns
    /// the rooms it left. Safe to call more than once.
    pub fn disconnect(&self, conn: ConnectionId) -> Vec<Uuid> {
        let mut inner = self.write();
        inner.connections.remove(&conn);
        let joined = inner.memberships.remove(&conn).unwrap_or_default();
        for session_id in &joined {
            if let Some(members) = inner.rooms.get_mut(session_id) {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(session_id);
                }
            }
        }
        joined.into_iter().collect()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[cfg(test)]
    #[must_use]
    pub fn is_member(&self, conn: ConnectionId, session_id: Uuid) -> bool {
        self.read()
            .rooms
            .get(&session_id)
            .is_some_and(|members| members.contains(&conn))
    }

    /// Current members of a room.
    #[must_use]
    pub fn members(&self, session_id: Uuid) -> Vec<ConnectionId> {
        self.read()
            .rooms
            .get(&session_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms a connection has joined.
    #[must_use]
    pub fn rooms_of(&self, conn: ConnectionId) -> Vec<Uuid> {
        self.read()
            .memberships
            .get(&conn)
            .map(|joined| joined.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    // =========================================================================
    // DELIVERY
    // =========================================================================

    /// Publish `event` to room `session_id`. Returns how many queues accepted it.
    pub fn broadcast(&self, session_id: Uuid, event: &ServerEvent, audience: Audience) -> usize {
        let targets = self.snapshot(session_id, audience);
        let mut delivered = 0;
        for (conn, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%conn, %session_id, event = event.name(), error = %e, "registry: dropped event"),
            }
        }
        debug!(%session_id, event = event.name(), delivered, "registry: broadcast");
        delivered
    }

    fn snapshot(&self, session_id: Uuid, audience: Audience) -> Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> {
        let inner = self.read();
        let mut targets: HashSet<ConnectionId> = inner.rooms.get(&session_id).cloned().unwrap_or_default();
        match audience {
            Audience::Room => {}
            Audience::RoomAndOrigin(origin) => {
                targets.insert(origin);
            }
            Audience::RoomExcept(origin) => {
                targets.remove(&origin);
            }
        }
        targets
            .into_iter()
            .filter_map(|conn| inner.connections.get(&conn).map(|tx| (conn, tx.clone())))
            .collect()
    }
}

// =============================================================================
// GUARD
// =============================================================================

/// Disconnects a connection from the registry when dropped, so every exit
/// path of a connection task (close, error, abort, shutdown) cleans up.
pub struct ConnectionGuard {
    registry: SessionRegistry,
    conn: ConnectionId,
}

impl ConnectionGuard {
    #[must_use]
    pub fn new(registry: SessionRegistry, conn: ConnectionId) -> Self {
        Self { registry, conn }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let left = self.registry.disconnect(self.conn);
        debug!(conn = %self.conn, rooms = left.len(), "registry: connection released");
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
