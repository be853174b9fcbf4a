//! Reaction-time bookkeeping against the store

use reaction_arena_core::protocol::GameInformation;
use reaction_arena_core::{ArenaError, ReactionRecord, Result, Store, UserId};
use std::sync::Arc;
use tracing::debug;

/// A player's standing after one recorded round
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedTotals {
    pub reaction_time: f64,
    pub total_time: f64,
    /// Entries now in the record
    pub rounds: usize,
}

impl From<&ReactionRecord> for UpdatedTotals {
    fn from(record: &ReactionRecord) -> Self {
        Self {
            reaction_time: record.latest().unwrap_or_default(),
            total_time: record.total_time(),
            rounds: record.rounds_recorded(),
        }
    }
}

/// Checks a client-reported time. Negative or non-finite values are
/// rejected; anything slower than the round timeout counts as the timeout.
pub fn validate_reaction_time(reaction_time: f64, round_timeout: f64) -> Result<f64> {
    if !reaction_time.is_finite() || reaction_time < 0.0 {
        return Err(ArenaError::InvalidReactionTime(reaction_time));
    }
    Ok(reaction_time.min(round_timeout))
}

/// Appends round times and builds paired updates. The store is the source
/// of truth; nothing is cached here.
#[derive(Clone)]
pub struct ScoreTracker {
    store: Arc<dyn Store>,
}

impl ScoreTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append `reaction_time` to the user's record. The append is atomic in
    /// the store, so the returned total is the sum of every entry.
    pub async fn record_round(&self, user_id: &UserId, reaction_time: f64) -> Result<UpdatedTotals> {
        let record = self.store.append_reaction_time(user_id, reaction_time).await?;
        let totals = UpdatedTotals::from(&record);
        debug!(
            "Recorded round {} for {}: {:.3}s (total {:.3}s)",
            totals.rounds, user_id, totals.reaction_time, totals.total_time
        );
        Ok(totals)
    }

    /// Build the paired update for both sides.
    ///
    /// Returns `(for_me, for_opponent)`; each side sees its own latest time
    /// and total next to the other's, plus how many rounds the other
    /// completed.
    pub async fn paired_update(
        &self,
        me: &UserId,
        opponent: &UserId,
        my_completed: usize,
        opponent_completed: usize,
    ) -> Result<(GameInformation, GameInformation)> {
        let mine = UpdatedTotals::from(&self.store.reaction_record(me).await?);
        let theirs = UpdatedTotals::from(&self.store.reaction_record(opponent).await?);

        let for_me = GameInformation {
            opp_time: theirs.reaction_time,
            opp_total_time: theirs.total_time,
            my_time: mine.reaction_time,
            my_total_time: mine.total_time,
            opponent_iteration: Some(opponent_completed),
        };
        let for_opponent = GameInformation {
            opp_time: mine.reaction_time,
            opp_total_time: mine.total_time,
            my_time: theirs.reaction_time,
            my_total_time: theirs.total_time,
            opponent_iteration: Some(my_completed),
        };
        Ok((for_me, for_opponent))
    }
}
