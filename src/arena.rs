//! Arena - match coordination across connections

use crate::finalize::MatchFinalizer;
use crate::registry::{ConnectionRegistry, EventSender};
use crate::rooms::{Occupant, RoomAllocator};
use crate::rounds::{Delivery, MatchState, Participant, Phase};
use crate::scores::{ScoreTracker, validate_reaction_time};
use reaction_arena_core::protocol::{ClientEvent, GameStartingContent, ServerEvent, VirusClickedContent};
use reaction_arena_core::{
    ArenaConfig, ArenaError, ConnectionId, PlayerIdentity, Result, RoomId, RoundPlan, Store, UserId, generate_seed,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// In-memory session state: who is connected and where they sit.
///
/// One instance per server, owned by the `Arena`.
#[derive(Debug, Default)]
pub struct SessionStore {
    pub registry: ConnectionRegistry,
    pub rooms: RoomAllocator,
}

impl SessionStore {
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            debug!("Round {} position -> {}", delivery.round + 1, delivery.connection_id);
            self.registry
                .send(delivery.connection_id, ServerEvent::VirusPosition(delivery.position));
        }
    }
}

/// Who takes part in a finalization and who hears about it
struct FinalizeJob {
    room_id: RoomId,
    players: [UserId; 2],
    recipients: Vec<EventSender>,
}

/// Paired update to send once the store has been read
struct PairJob {
    me: UserId,
    opponent: UserId,
    my_completed: usize,
    opponent_completed: usize,
    my_tx: Option<EventSender>,
    opponent_tx: Option<EventSender>,
}

/// Arena - pairs players into rooms and runs their matches.
///
/// Cheap to clone; every clone shares the same sessions and store.
#[derive(Clone)]
pub struct Arena {
    config: Arc<ArenaConfig>,
    store: Arc<dyn Store>,
    sessions: Arc<Mutex<SessionStore>>,
    scores: ScoreTracker,
    finalizer: MatchFinalizer,
    next_connection: Arc<AtomicU64>,
}

impl Arena {
    /// Create a new Arena
    pub fn new(config: ArenaConfig, store: Arc<dyn Store>) -> Self {
        Self {
            scores: ScoreTracker::new(store.clone()),
            finalizer: MatchFinalizer::new(store.clone(), config.leaderboard_size),
            config: Arc::new(config),
            store,
            sessions: Arc::new(Mutex::new(SessionStore::default())),
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Track a new connection whose outbound events go to `tx`
    pub async fn connect(&self, tx: EventSender) -> ConnectionId {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        self.sessions.lock().await.registry.open(id, tx);
        debug!("Connection opened: {}", id);
        id
    }

    /// Dispatch one inbound event
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::RegisterUser(content) => self.register(conn, &content.username).await,
            ClientEvent::VirusClicked(content) => self.virus_clicked(conn, content).await,
            ClientEvent::SaveData(_) => self.save_data(conn).await,
        }
    }

    /// Identity of a live connection
    pub async fn lookup(&self, conn: ConnectionId) -> Option<PlayerIdentity> {
        self.sessions.lock().await.registry.lookup(conn).cloned()
    }

    pub async fn room_of(&self, conn: ConnectionId) -> Option<RoomId> {
        self.sessions.lock().await.registry.room_of(conn).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.sessions.lock().await.rooms.len()
    }

    pub async fn occupant_count(&self, room_id: &str) -> usize {
        self.sessions
            .lock()
            .await
            .rooms
            .room(room_id)
            .map_or(0, |room| room.occupants().len())
    }

    pub async fn plan_of(&self, room_id: &str) -> Option<RoundPlan> {
        let sessions = self.sessions.lock().await;
        Some(sessions.rooms.room(room_id)?.game()?.plan().clone())
    }

    pub async fn phase_of(&self, room_id: &str) -> Option<Phase> {
        let sessions = self.sessions.lock().await;
        Some(sessions.rooms.room(room_id)?.game()?.phase())
    }

    async fn send_error(&self, conn: ConnectionId, message: String) {
        self.sessions
            .lock()
            .await
            .registry
            .send(conn, ServerEvent::Error(message));
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Bind `username` to the connection and seat it in a room.
    ///
    /// Failures are reported to the connection; it stays open.
    pub async fn register(&self, conn: ConnectionId, username: &str) {
        if let Err(e) = self.try_register(conn, username).await {
            let message = match &e {
                ArenaError::StoreUnavailable(_) | ArenaError::UserNotFound(_) => {
                    error!("Registration failed for {}: {}", conn, e);
                    "An error occurred during registration.".to_string()
                }
                _ => {
                    warn!("Registration rejected for {}: {}", conn, e);
                    e.client_message()
                }
            };
            self.send_error(conn, message).await;
        }
    }

    async fn try_register(&self, conn: ConnectionId, username: &str) -> Result<()> {
        let username = self.validate_username(username)?;
        // the name stays claimed across the store calls below
        self.sessions.lock().await.registry.reserve(conn, &username)?;

        let outcome = self.seat(conn, &username).await;
        if outcome.is_err() {
            self.sessions.lock().await.registry.release(conn);
        }
        outcome
    }

    async fn seat(&self, conn: ConnectionId, username: &str) -> Result<()> {
        let (user, created) = self.store.find_or_create_user(username).await?;
        if !created {
            // returning player: start the match from an empty record
            self.store.reset_user(&user.id).await?;
        }

        let mut guard = self.sessions.lock().await;
        let sessions = &mut *guard;
        if !sessions.registry.contains(conn) {
            debug!("{} left before registration finished", conn);
            return Ok(());
        }

        let identity = sessions.registry.register(conn, &user)?;
        sessions.registry.send(conn, ServerEvent::UserId(user.id.clone()));

        let allocation = sessions.rooms.allocate(Occupant::from(&identity));
        sessions.registry.set_room(conn, allocation.room_id.clone());
        info!("{} registered in room {}", identity.username, allocation.room_id);

        if allocation.ready {
            self.start_match(sessions, &allocation.room_id);
        } else {
            sessions.registry.send(conn, ServerEvent::WaitingLobby);
        }
        Ok(())
    }

    fn validate_username(&self, username: &str) -> Result<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ArenaError::InvalidUsername("username is empty".to_string()));
        }
        if username.chars().count() > self.config.max_username_len {
            return Err(ArenaError::InvalidUsername(format!(
                "username is longer than {} characters",
                self.config.max_username_len
            )));
        }
        Ok(username.to_string())
    }

    /// Generate the plan once and push the first position to both players
    fn start_match(&self, sessions: &mut SessionStore, room_id: &str) {
        let Some(room) = sessions.rooms.room_mut(room_id) else {
            return;
        };
        let plan = RoundPlan::generate(generate_seed(), &self.config);
        debug!("Room {} plan seed {}", room_id, plan.seed());
        let Some(game) = room.start(plan, self.config.pacing) else {
            return;
        };

        let [a, b] = game.players();
        let greetings = [
            (a.connection_id, b.username.clone()),
            (b.connection_id, a.username.clone()),
        ];
        let deliveries = game.due_deliveries();

        for (connection_id, opponent_name) in greetings {
            sessions.registry.send(
                connection_id,
                ServerEvent::GameStarting(GameStartingContent { opponent_name }),
            );
        }
        sessions.deliver(deliveries);
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Record one round completion for the connection's player
    pub async fn virus_clicked(&self, conn: ConnectionId, click: VirusClickedContent) {
        if let Err(e) = self.try_virus_clicked(conn, click).await {
            warn!("Round event from {} failed: {}", conn, e);
            self.send_error(conn, e.client_message()).await;
        }
    }

    async fn try_virus_clicked(&self, conn: ConnectionId, click: VirusClickedContent) -> Result<()> {
        let reaction_time = validate_reaction_time(click.reaction_time, self.config.round_timeout)?;

        // Advance the in-memory round first; persistence does not gate it
        let (identity, room_id) = {
            let mut guard = self.sessions.lock().await;
            let sessions = &mut *guard;
            let identity = sessions
                .registry
                .lookup(conn)
                .cloned()
                .ok_or(ArenaError::NotRegistered)?;

            if let Some(claimed) = &click.user_id {
                if *claimed != identity.user_id {
                    warn!("{} reported user {} but is {}", conn, claimed, identity.user_id);
                }
            }

            let Some(room_id) = sessions.registry.room_of(conn).cloned() else {
                return Ok(());
            };
            let Some(game) = sessions.rooms.room_mut(&room_id).and_then(|r| r.game_mut()) else {
                debug!("{} clicked before the match started", identity.username);
                return Ok(());
            };

            match game.complete_round(&identity.user_id, click.iteration) {
                Ok(_) => {}
                Err(rejection) => {
                    debug!("Ignored click from {}: {:?}", identity.username, rejection);
                    return Ok(());
                }
            }
            let deliveries = game.due_deliveries();
            sessions.deliver(deliveries);
            (identity, room_id)
        };

        let stored = match self.scores.record_round(&identity.user_id, reaction_time).await {
            Ok(totals) => Some(totals.rounds),
            Err(e) => {
                error!("Failed to record round for {}: {}", identity.username, e);
                self.send_error(conn, e.client_message()).await;
                None
            }
        };

        let (pair, finalize) = {
            let mut guard = self.sessions.lock().await;
            let sessions = &mut *guard;
            let Some(room) = sessions.rooms.room_mut(&room_id) else {
                return Ok(());
            };
            let Some(game) = room.game_mut() else {
                return Ok(());
            };

            let pair = match game.settle_round(&identity.user_id, stored) {
                Some(_) => pair_job(game, &identity.user_id, &sessions.registry),
                None => None,
            };
            let finalize = finalize_job(game, &room_id, &sessions.registry);
            room.refresh_status();
            (pair, finalize)
        };

        if let Some(pair) = pair {
            self.send_paired_update(pair).await;
        }
        if let Some(job) = finalize {
            self.run_finalize(job).await;
        }
        Ok(())
    }

    async fn send_paired_update(&self, job: PairJob) {
        match self
            .scores
            .paired_update(&job.me, &job.opponent, job.my_completed, job.opponent_completed)
            .await
        {
            Ok((for_me, for_opponent)) => {
                debug!("Paired update {} <-> {}", job.me, job.opponent);
                if let Some(tx) = job.my_tx {
                    let _ = tx.send(ServerEvent::OnGameInformationUpdated(for_me));
                }
                if let Some(tx) = job.opponent_tx {
                    let _ = tx.send(ServerEvent::OnGameInformationUpdated(for_opponent));
                }
            }
            Err(e) => {
                error!("Failed to read scores for paired update: {}", e);
                if let Some(tx) = job.my_tx {
                    let _ = tx.send(ServerEvent::Error(e.client_message()));
                }
            }
        }
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Results request from a client. Finalizes a completed match once and
    /// answers with the leaderboard.
    pub async fn save_data(&self, conn: ConnectionId) {
        if let Err(e) = self.try_save_data(conn).await {
            warn!("saveData from {} failed: {}", conn, e);
            self.send_error(conn, e.client_message()).await;
        }
    }

    async fn try_save_data(&self, conn: ConnectionId) -> Result<()> {
        let job = {
            let mut guard = self.sessions.lock().await;
            let sessions = &mut *guard;
            let identity = sessions
                .registry
                .lookup(conn)
                .cloned()
                .ok_or(ArenaError::NotRegistered)?;

            let room_id = sessions.registry.room_of(conn).cloned();
            let game = room_id
                .as_deref()
                .and_then(|id| sessions.rooms.room_mut(id))
                .and_then(|room| room.game_mut());

            match (game, room_id) {
                (Some(game), Some(room_id)) => {
                    if !game.is_complete() {
                        // results go to the whole room once the match completes
                        debug!("{} asked for results before the match completed", identity.username);
                        return Ok(());
                    }
                    finalize_job(game, &room_id, &sessions.registry)
                }
                _ => None,
            }
        };

        match job {
            // the job's recipients already include this connection
            Some(job) => self.run_finalize(job).await,
            None => {
                let board = self.finalizer.leaderboard().await?;
                self.sessions
                    .lock()
                    .await
                    .registry
                    .send(conn, ServerEvent::ShowHighestScores(board));
            }
        }
        Ok(())
    }

    async fn run_finalize(&self, job: FinalizeJob) {
        let [p1, p2] = &job.players;
        let outcome = match self.finalizer.finalize(p1, p2).await {
            Ok(_) => self.finalizer.leaderboard().await,
            Err(e) => {
                // let a later completion or saveData retry
                let mut sessions = self.sessions.lock().await;
                if let Some(game) = sessions.rooms.room_mut(&job.room_id).and_then(|r| r.game_mut()) {
                    game.finalize_failed();
                }
                Err(e)
            }
        };

        match outcome {
            Ok(board) => {
                info!("Room {} results sent to {} player(s)", job.room_id, job.recipients.len());
                for tx in &job.recipients {
                    let _ = tx.send(ServerEvent::ShowHighestScores(board.clone()));
                }
            }
            Err(e) => {
                error!("Finalization of room {} failed: {}", job.room_id, e);
                for tx in &job.recipients {
                    let _ = tx.send(ServerEvent::Error(e.client_message()));
                }
            }
        }
    }

    // =========================================================================
    // Disconnect
    // =========================================================================

    /// Drop the connection. In-flight store calls still complete; their
    /// results just have nowhere to go.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let finalize = {
            let mut guard = self.sessions.lock().await;
            let sessions = &mut *guard;
            let Some((identity, room_id)) = sessions.registry.remove(conn) else {
                return;
            };
            let name = identity.as_ref().map_or("<unregistered>", |i| i.username.as_str());
            info!("{} disconnected ({})", name, conn);

            let Some(room_id) = room_id else {
                return;
            };
            let Some(departure) = sessions.rooms.leave(&room_id, conn) else {
                return;
            };
            if departure.reclaimed {
                return;
            }

            let Some(room) = sessions.rooms.room_mut(&room_id) else {
                return;
            };
            let Some(game) = room.game_mut() else {
                return;
            };

            let deliveries = game.due_deliveries();
            let finalize = finalize_job(game, &room_id, &sessions.registry);
            room.refresh_status();

            for occupant in &departure.remaining {
                sessions.registry.send(occupant.connection_id, ServerEvent::OpponentLeft);
            }
            sessions.deliver(deliveries);
            finalize
        };

        if let Some(job) = finalize {
            self.run_finalize(job).await;
        }
    }
}

/// Claim finalization if the match is complete and nobody claimed it yet
fn finalize_job(game: &mut MatchState, room_id: &str, registry: &ConnectionRegistry) -> Option<FinalizeJob> {
    if !game.is_complete() || !game.begin_finalize() {
        return None;
    }
    let [a, b] = game.players();
    let recipients = game
        .players()
        .iter()
        .filter(|p| p.connected)
        .filter_map(|p| registry.sender(p.connection_id))
        .collect();
    Some(FinalizeJob {
        room_id: room_id.to_string(),
        players: [a.user_id.clone(), b.user_id.clone()],
        recipients,
    })
}

fn pair_job(game: &MatchState, me: &str, registry: &ConnectionRegistry) -> Option<PairJob> {
    let mine = game.player(me)?;
    let theirs = game.opponent_of(me)?;
    let sender = |p: &Participant| {
        if p.connected {
            registry.sender(p.connection_id)
        } else {
            None
        }
    };
    Some(PairJob {
        me: mine.user_id.clone(),
        opponent: theirs.user_id.clone(),
        my_completed: mine.completed(),
        opponent_completed: theirs.completed(),
        my_tx: sender(mine),
        opponent_tx: sender(theirs),
    })
}
