//! Per-room round synchronization

use reaction_arena_core::{ConnectionId, PacingMode, Position, ROUNDS, RoundPlan, UserId};
use tracing::debug;

/// Where a match stands, as seen from the slowest connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Plan generated, nothing delivered yet
    Ready,
    /// 1-based round currently shown
    RoundActive(usize),
    /// Every connected player finished all rounds
    Complete,
}

/// Why a completion event was not counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownPlayer,
    /// The player already finished every round
    Finished,
    /// The round was never shown to the player
    NotShown,
    /// `iteration` points at a round the player already completed
    Stale { iteration: usize, current: usize },
}

/// A stimulus position to push to one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub connection_id: ConnectionId,
    pub round: usize,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: UserId,
    pub username: String,
    pub connection_id: ConnectionId,
    pub connected: bool,
    /// Positions pushed to this player
    delivered: usize,
    /// Completion events accepted
    completed: usize,
    /// Completions whose persistence attempt finished, successful or not
    settled: usize,
    /// Length of the stored record after the last successful append
    recorded: usize,
}

impl Participant {
    pub fn new(user_id: UserId, username: String, connection_id: ConnectionId) -> Self {
        Self {
            user_id,
            username,
            connection_id,
            connected: true,
            delivered: 0,
            completed: 0,
            settled: 0,
            recorded: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }
}

/// Round state machine of one match.
///
/// Round indices only move forward. The plan is fixed for the lifetime of
/// the match.
#[derive(Debug, Clone)]
pub struct MatchState {
    plan: RoundPlan,
    pacing: PacingMode,
    players: [Participant; 2],
    /// Rounds for which a paired update went out
    paired: usize,
    finalized: bool,
}

impl MatchState {
    pub fn new(plan: RoundPlan, pacing: PacingMode, players: [Participant; 2]) -> Self {
        Self {
            plan,
            pacing,
            players,
            paired: 0,
            finalized: false,
        }
    }

    pub fn plan(&self) -> &RoundPlan {
        &self.plan
    }

    pub fn players(&self) -> &[Participant; 2] {
        &self.players
    }

    pub fn player(&self, user_id: &str) -> Option<&Participant> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn opponent_of(&self, user_id: &str) -> Option<&Participant> {
        self.players.iter().find(|p| p.user_id != user_id)
    }

    fn player_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn phase(&self) -> Phase {
        if self.is_complete() {
            return Phase::Complete;
        }
        let shown = self
            .players
            .iter()
            .filter(|p| p.connected)
            .map(|p| p.delivered)
            .min()
            .unwrap_or(0);
        if shown == 0 {
            Phase::Ready
        } else {
            Phase::RoundActive(shown)
        }
    }

    /// Count a completion for the player's current round and return its
    /// 0-based index.
    pub fn complete_round(&mut self, user_id: &str, iteration: Option<usize>) -> Result<usize, Rejection> {
        let player = self.player_mut(user_id).ok_or(Rejection::UnknownPlayer)?;

        if player.completed >= ROUNDS {
            return Err(Rejection::Finished);
        }
        if let Some(iteration) = iteration {
            if iteration < player.completed {
                return Err(Rejection::Stale {
                    iteration,
                    current: player.completed,
                });
            }
        }
        if player.completed >= player.delivered {
            return Err(Rejection::NotShown);
        }

        let round = player.completed;
        player.completed += 1;
        debug!("{} completed round {}", player.username, round + 1);
        Ok(round)
    }

    /// Positions that became due. Lockstep waits for every connected player
    /// to finish a round; independent pacing only looks at the player itself.
    pub fn due_deliveries(&mut self) -> Vec<Delivery> {
        let barrier = self
            .players
            .iter()
            .filter(|p| p.connected)
            .map(|p| p.completed)
            .min()
            .unwrap_or(0);

        let mut out = Vec::new();
        for player in self.players.iter_mut().filter(|p| p.connected) {
            let frontier = match self.pacing {
                PacingMode::Lockstep => barrier,
                PacingMode::Independent => player.completed,
            };
            while player.delivered <= frontier && player.delivered < ROUNDS {
                if let Some(position) = self.plan.position(player.delivered) {
                    out.push(Delivery {
                        connection_id: player.connection_id,
                        round: player.delivered,
                        position,
                    });
                }
                player.delivered += 1;
            }
        }
        out
    }

    /// Note that the player's persistence attempt for a round finished.
    /// `stored_rounds` is the record length on success.
    ///
    /// Returns the 0-based round for which both players now have an entry,
    /// at most once per round.
    ///
    /// Pairing follows stored record lengths, not round indices. After a
    /// failed append that player's record stays one entry short, so every
    /// later pairing trails by a round and the last round is never paired.
    pub fn settle_round(&mut self, user_id: &str, stored_rounds: Option<usize>) -> Option<usize> {
        let player = self.player_mut(user_id)?;
        player.settled = (player.settled + 1).min(player.completed);
        if let Some(rounds) = stored_rounds {
            player.recorded = player.recorded.max(rounds);
        }

        let both = self.players.iter().map(|p| p.recorded).min().unwrap_or(0);
        if both > self.paired {
            self.paired = both;
            Some(both - 1)
        } else {
            None
        }
    }

    /// Mark the player's connection as gone; they stop holding back the barrier
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<&Participant> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.connection_id == connection_id)?;
        player.connected = false;
        Some(player)
    }

    /// Every connected player has all rounds completed and settled
    pub fn is_complete(&self) -> bool {
        let mut connected = self.players.iter().filter(|p| p.connected).peekable();
        connected.peek().is_some() && connected.all(|p| p.settled >= ROUNDS)
    }

    /// Claim the right to persist the result. True exactly once, unless
    /// released again with `finalize_failed`.
    pub fn begin_finalize(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.finalized = true;
        true
    }

    pub fn finalize_failed(&mut self) {
        self.finalized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaction_arena_core::ArenaConfig;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);

    fn new_match(pacing: PacingMode) -> MatchState {
        let plan = RoundPlan::generate(99, &ArenaConfig::default());
        MatchState::new(
            plan,
            pacing,
            [
                Participant::new("ua".to_string(), "alice".to_string(), A),
                Participant::new("ub".to_string(), "bob".to_string(), B),
            ],
        )
    }

    fn rounds_for(deliveries: &[Delivery], conn: ConnectionId) -> Vec<usize> {
        deliveries
            .iter()
            .filter(|d| d.connection_id == conn)
            .map(|d| d.round)
            .collect()
    }

    #[test]
    fn test_first_position_goes_to_both() {
        let mut game = new_match(PacingMode::Lockstep);
        assert_eq!(game.phase(), Phase::Ready);

        let out = game.due_deliveries();
        assert_eq!(rounds_for(&out, A), vec![0]);
        assert_eq!(rounds_for(&out, B), vec![0]);
        assert_eq!(out[0].position, out[1].position);
        assert_eq!(game.phase(), Phase::RoundActive(1));

        assert!(game.due_deliveries().is_empty());
    }

    #[test]
    fn test_lockstep_waits_for_both() {
        let mut game = new_match(PacingMode::Lockstep);
        game.due_deliveries();

        assert_eq!(game.complete_round("ua", Some(0)), Ok(0));
        assert!(game.due_deliveries().is_empty());

        // alice cannot run ahead of the barrier
        assert_eq!(game.complete_round("ua", Some(1)), Err(Rejection::NotShown));

        assert_eq!(game.complete_round("ub", Some(0)), Ok(0));
        let out = game.due_deliveries();
        assert_eq!(rounds_for(&out, A), vec![1]);
        assert_eq!(rounds_for(&out, B), vec![1]);
        assert_eq!(game.phase(), Phase::RoundActive(2));
    }

    #[test]
    fn test_independent_pacing_runs_ahead() {
        let mut game = new_match(PacingMode::Independent);
        game.due_deliveries();

        game.complete_round("ua", None).unwrap();
        let out = game.due_deliveries();
        assert_eq!(rounds_for(&out, A), vec![1]);
        assert!(rounds_for(&out, B).is_empty());

        game.complete_round("ua", None).unwrap();
        assert_eq!(rounds_for(&game.due_deliveries(), A), vec![2]);
        assert_eq!(game.player("ua").unwrap().completed(), 2);
        assert_eq!(game.player("ub").unwrap().completed(), 0);
    }

    #[test]
    fn test_stale_iteration_is_dropped() {
        let mut game = new_match(PacingMode::Independent);
        game.due_deliveries();
        game.complete_round("ua", Some(0)).unwrap();
        game.due_deliveries();

        assert_eq!(
            game.complete_round("ua", Some(0)),
            Err(Rejection::Stale { iteration: 0, current: 1 })
        );
        assert_eq!(game.complete_round("nobody", None), Err(Rejection::UnknownPlayer));
    }

    #[test]
    fn test_paired_round_emitted_once_when_both_recorded() {
        let mut game = new_match(PacingMode::Lockstep);
        game.due_deliveries();
        game.complete_round("ua", Some(0)).unwrap();
        game.complete_round("ub", Some(0)).unwrap();

        assert_eq!(game.settle_round("ua", Some(1)), None);
        assert_eq!(game.settle_round("ub", Some(1)), Some(0));
        assert_eq!(game.settle_round("ub", Some(1)), None);
    }

    #[test]
    fn test_failed_append_never_pairs() {
        let mut game = new_match(PacingMode::Lockstep);
        game.due_deliveries();
        game.complete_round("ua", Some(0)).unwrap();
        game.complete_round("ub", Some(0)).unwrap();

        assert_eq!(game.settle_round("ua", None), None);
        assert_eq!(game.settle_round("ub", Some(1)), None);
    }

    #[test]
    fn test_failed_append_shifts_pairing_by_one() {
        let mut game = new_match(PacingMode::Lockstep);
        game.due_deliveries();
        let mut paired = Vec::new();
        let mut stored_a = 0;
        for round in 0..ROUNDS {
            game.complete_round("ua", Some(round)).unwrap();
            game.complete_round("ub", Some(round)).unwrap();
            // alice's first append is lost
            let a = if round == 0 {
                None
            } else {
                stored_a += 1;
                Some(stored_a)
            };
            paired.extend(game.settle_round("ua", a));
            paired.extend(game.settle_round("ub", Some(round + 1)));
            game.due_deliveries();
        }

        assert_eq!(paired, (0..ROUNDS - 1).collect::<Vec<_>>());
        // the match still completes and can be finalized
        assert!(game.is_complete());
    }

    #[test]
    fn test_full_match_completes() {
        let mut game = new_match(PacingMode::Lockstep);
        game.due_deliveries();
        for round in 0..ROUNDS {
            game.complete_round("ua", Some(round)).unwrap();
            game.complete_round("ub", Some(round)).unwrap();
            game.settle_round("ua", Some(round + 1));
            game.settle_round("ub", Some(round + 1));
            game.due_deliveries();
        }

        assert!(game.is_complete());
        assert_eq!(game.phase(), Phase::Complete);
        assert_eq!(game.complete_round("ua", None), Err(Rejection::Finished));
        assert!(game.begin_finalize());
        assert!(!game.begin_finalize());
        game.finalize_failed();
        assert!(game.begin_finalize());
    }

    #[test]
    fn test_disconnect_releases_barrier() {
        let mut game = new_match(PacingMode::Lockstep);
        game.due_deliveries();
        game.complete_round("ua", Some(0)).unwrap();
        assert!(game.due_deliveries().is_empty());

        game.disconnect(B);
        let out = game.due_deliveries();
        assert_eq!(rounds_for(&out, A), vec![1]);
        assert!(rounds_for(&out, B).is_empty());
        assert_eq!(game.phase(), Phase::RoundActive(2));

        // nobody left to finish the match
        game.disconnect(A);
        assert!(!game.is_complete());
    }
}
