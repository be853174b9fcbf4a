//! Live connections and who is behind them

use reaction_arena_core::protocol::ServerEvent;
use reaction_arena_core::{ArenaError, ConnectionId, PlayerIdentity, Result, RoomId, User};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound queue of one connection
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug)]
struct Connection {
    tx: EventSender,
    identity: Option<PlayerIdentity>,
    /// Username claimed by a registration still waiting on the store
    reserved: Option<String>,
    room_id: Option<RoomId>,
}

/// Ephemeral map from connection to player identity. Nothing here is persisted.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a fresh, not yet registered connection
    pub fn open(&mut self, id: ConnectionId, tx: EventSender) {
        self.connections.insert(
            id,
            Connection {
                tx,
                identity: None,
                reserved: None,
                room_id: None,
            },
        );
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Whether `username` may be registered on connection `id`
    pub fn check_available(&self, id: ConnectionId, username: &str) -> Result<()> {
        let conn = self.connections.get(&id).ok_or(ArenaError::NotRegistered)?;
        if conn.identity.is_some() || conn.reserved.is_some() {
            return Err(ArenaError::AlreadyRegistered);
        }
        if self.name_taken(id, username) {
            return Err(ArenaError::UsernameInUse(username.to_string()));
        }
        Ok(())
    }

    /// Claim `username` for connection `id` until `register` or `release`.
    /// Other connections see the name as taken meanwhile.
    pub fn reserve(&mut self, id: ConnectionId, username: &str) -> Result<()> {
        self.check_available(id, username)?;
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.reserved = Some(username.to_string());
        }
        Ok(())
    }

    /// Drop a pending reservation
    pub fn release(&mut self, id: ConnectionId) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.reserved = None;
        }
    }

    /// Bind `user` to connection `id`, consuming its reservation
    pub fn register(&mut self, id: ConnectionId, user: &User) -> Result<PlayerIdentity> {
        if self.name_taken(id, &user.username) {
            return Err(ArenaError::UsernameInUse(user.username.clone()));
        }
        let conn = self.connections.get_mut(&id).ok_or(ArenaError::NotRegistered)?;
        if conn.identity.is_some() {
            return Err(ArenaError::AlreadyRegistered);
        }
        let identity = PlayerIdentity {
            connection_id: id,
            user_id: user.id.clone(),
            username: user.username.clone(),
        };
        conn.identity = Some(identity.clone());
        conn.reserved = None;
        debug!("Registered {} as {} ({})", id, user.username, user.id);
        Ok(identity)
    }

    /// Held or reserved by a connection other than `id`
    fn name_taken(&self, id: ConnectionId, username: &str) -> bool {
        self.connections
            .iter()
            .filter(|(other, _)| **other != id)
            .any(|(_, conn)| {
                conn.reserved.as_deref() == Some(username)
                    || conn.identity.as_ref().is_some_and(|identity| identity.username == username)
            })
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<&PlayerIdentity> {
        self.connections.get(&id)?.identity.as_ref()
    }

    /// Forget the connection. Returns its identity and room, if any.
    pub fn remove(&mut self, id: ConnectionId) -> Option<(Option<PlayerIdentity>, Option<RoomId>)> {
        self.connections
            .remove(&id)
            .map(|conn| (conn.identity, conn.room_id))
    }

    pub fn set_room(&mut self, id: ConnectionId, room_id: RoomId) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.room_id = Some(room_id);
        }
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<&RoomId> {
        self.connections.get(&id)?.room_id.as_ref()
    }

    pub fn sender(&self, id: ConnectionId) -> Option<EventSender> {
        self.connections.get(&id).map(|conn| conn.tx.clone())
    }

    /// Queue `event` for connection `id`. Events for absent or closed
    /// connections are dropped.
    pub fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
