//! End-of-match persistence and leaderboard

use reaction_arena_core::leaderboard::{self, HighestScorer, Leaderboard};
use reaction_arena_core::{MatchResult, Result, Store, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct MatchFinalizer {
    store: Arc<dyn Store>,
    leaderboard_size: usize,
}

impl MatchFinalizer {
    pub fn new(store: Arc<dyn Store>, leaderboard_size: usize) -> Self {
        Self {
            store,
            leaderboard_size,
        }
    }

    /// Freeze both players' current records into one stored result
    pub async fn finalize(&self, player1: &UserId, player2: &UserId) -> Result<MatchResult> {
        let first = self.store.reaction_record(player1).await?.snapshot();
        let second = self.store.reaction_record(player2).await?.snapshot();
        let result = self.store.create_match_result(first, second).await?;
        info!(
            "Match {} finalized: {:.3}s vs {:.3}s",
            result.id, result.player1.total_time, result.player2.total_time
        );
        Ok(result)
    }

    /// Recent matches with display names, and the fastest player by mean
    /// time across every stored record
    pub async fn leaderboard(&self) -> Result<Leaderboard> {
        let results = self.store.recent_match_results(self.leaderboard_size).await?;
        let records = self.store.all_reaction_records().await?;
        let best = leaderboard::lowest_mean(&records).map(|(record, mean)| (record.user_id.clone(), mean));

        let mut ids = leaderboard::referenced_users(&results);
        if let Some((id, _)) = &best {
            ids.push(id.clone());
        }
        let names: HashMap<UserId, String> = self
            .store
            .users_by_ids(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect();

        let highest_scorer = best.map(|(player_id, mean)| HighestScorer {
            name: names.get(&player_id).cloned(),
            player_id,
            average_reaction_time: leaderboard::round_millis(mean),
        });

        Ok(Leaderboard {
            last_matches: leaderboard::summarize(&results, &names),
            highest_scorer,
        })
    }
}
