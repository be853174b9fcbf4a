//! Room allocation and lifecycle

use crate::rounds::{MatchState, Participant};
use reaction_arena_core::{ConnectionId, PacingMode, PlayerIdentity, RoomId, RoomStatus, RoundPlan, generate_room_id};
use tracing::{debug, info};

/// Most players a room ever holds
pub const ROOM_CAPACITY: usize = 2;

/// A player currently sitting in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub username: String,
}

impl From<&PlayerIdentity> for Occupant {
    fn from(identity: &PlayerIdentity) -> Self {
        Self {
            connection_id: identity.connection_id,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
        }
    }
}

/// Pairing container. Groups players; owns only the round state of its match.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub status: RoomStatus,
    occupants: Vec<Occupant>,
    game: Option<MatchState>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            status: RoomStatus::Waiting,
            occupants: Vec::with_capacity(ROOM_CAPACITY),
            game: None,
        }
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn is_open(&self) -> bool {
        self.status == RoomStatus::Waiting && self.occupants.len() < ROOM_CAPACITY
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= ROOM_CAPACITY
    }

    pub fn game(&self) -> Option<&MatchState> {
        self.game.as_ref()
    }

    pub fn game_mut(&mut self) -> Option<&mut MatchState> {
        self.game.as_mut()
    }

    /// Start the match with a fresh plan. Only a full room without a match
    /// can start; a plan is never replaced.
    pub fn start(&mut self, plan: RoundPlan, pacing: PacingMode) -> Option<&mut MatchState> {
        if self.game.is_some() || !self.is_full() {
            return None;
        }
        let [a, b] = [&self.occupants[0], &self.occupants[1]]
            .map(|o| Participant::new(o.user_id.clone(), o.username.clone(), o.connection_id));
        self.status = RoomStatus::Playing;
        info!("Room {} starting: {} vs {}", self.id, a.username, b.username);
        self.game = Some(MatchState::new(plan, pacing, [a, b]));
        self.game.as_mut()
    }

    /// Move a running room to `Complete` once its match is
    pub fn refresh_status(&mut self) {
        if let Some(game) = &self.game {
            if game.is_complete() {
                self.status = RoomStatus::Complete;
            }
        }
    }
}

/// Where `allocate` put a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub room_id: RoomId,
    /// The room just reached capacity
    pub ready: bool,
}

/// What a departure left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub remaining: Vec<Occupant>,
    /// The room became empty and was deleted
    pub reclaimed: bool,
}

/// Open rooms in arrival order. First fit wins, no skill matching.
#[derive(Debug, Default)]
pub struct RoomAllocator {
    rooms: Vec<Room>,
}

impl RoomAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat the player in the oldest open room, or a new one
    pub fn allocate(&mut self, occupant: Occupant) -> Allocation {
        let index = match self.rooms.iter().position(Room::is_open) {
            Some(index) => index,
            None => {
                let id = self.unique_room_id();
                debug!("Created room {}", id);
                self.rooms.push(Room::new(id));
                self.rooms.len() - 1
            }
        };

        let room = &mut self.rooms[index];
        debug!("{} joined room {}", occupant.username, room.id);
        room.occupants.push(occupant);

        Allocation {
            room_id: room.id.clone(),
            ready: room.is_full(),
        }
    }

    /// Remove the connection from its room; delete the room when it empties
    pub fn leave(&mut self, room_id: &str, connection_id: ConnectionId) -> Option<Departure> {
        let index = self.rooms.iter().position(|r| r.id == room_id)?;
        let room = &mut self.rooms[index];
        room.occupants.retain(|o| o.connection_id != connection_id);
        if let Some(game) = room.game.as_mut() {
            game.disconnect(connection_id);
        }

        let remaining = room.occupants.clone();
        let reclaimed = remaining.is_empty();
        if reclaimed {
            let room = self.rooms.remove(index);
            debug!("Reclaimed room {}", room.id);
        }

        Some(Departure {
            room_id: room_id.to_string(),
            remaining,
            reclaimed,
        })
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn unique_room_id(&self) -> RoomId {
        loop {
            let id = generate_room_id();
            if self.room(&id).is_none() {
                return id;
            }
        }
    }
}
