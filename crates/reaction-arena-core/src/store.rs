//! Persistence interface and an in-memory implementation

use crate::error::{ArenaError, Result};
use crate::types::{MatchResult, PlayerSnapshot, ReactionRecord, User, UserId, now_ms};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// CRUD surface the coordinator needs from the external store.
///
/// `append_reaction_time` must be atomic per user: concurrent appends for
/// the same user may never compute from the same stale sequence.
#[async_trait]
pub trait Store: Send + Sync {
    /// Look a user up by name, creating it when unseen. The flag is `true`
    /// when the user was created by this call.
    async fn find_or_create_user(&self, username: &str) -> Result<(User, bool)>;

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>>;

    /// Clear the user's reaction times, making the total zero
    async fn reset_user(&self, user_id: &UserId) -> Result<()>;

    /// Current record; empty when nothing was recorded yet
    async fn reaction_record(&self, user_id: &UserId) -> Result<ReactionRecord>;

    /// Append one time and return the updated record
    async fn append_reaction_time(&self, user_id: &UserId, reaction_time: f64) -> Result<ReactionRecord>;

    async fn all_reaction_records(&self) -> Result<Vec<ReactionRecord>>;

    async fn create_match_result(&self, player1: PlayerSnapshot, player2: PlayerSnapshot) -> Result<MatchResult>;

    /// Newest first
    async fn recent_match_results(&self, limit: usize) -> Result<Vec<MatchResult>>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<UserId, User>,
    by_name: HashMap<String, UserId>,
    reactions: HashMap<UserId, ReactionRecord>,
    results: Vec<MatchResult>,
}

/// Process-local store. Every operation runs under one lock, which makes
/// appends atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn match_count(&self) -> usize {
        self.inner.read().await.results.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_or_create_user(&self, username: &str) -> Result<(User, bool)> {
        let mut inner = self.inner.write().await;

        if let Some(id) = inner.by_name.get(username) {
            let user = inner
                .users
                .get(id)
                .cloned()
                .ok_or_else(|| ArenaError::UserNotFound(id.clone()))?;
            return Ok((user, false));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
        };
        inner.by_name.insert(user.username.clone(), user.id.clone());
        inner.users.insert(user.id.clone(), user.clone());
        inner
            .reactions
            .insert(user.id.clone(), ReactionRecord::new(user.id.clone()));

        debug!("Created user {} ({})", user.username, user.id);
        Ok((user, true))
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn reset_user(&self, user_id: &UserId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(user_id) {
            return Err(ArenaError::UserNotFound(user_id.clone()));
        }
        inner
            .reactions
            .insert(user_id.clone(), ReactionRecord::new(user_id.clone()));
        Ok(())
    }

    async fn reaction_record(&self, user_id: &UserId) -> Result<ReactionRecord> {
        let inner = self.inner.read().await;
        Ok(inner
            .reactions
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| ReactionRecord::new(user_id.clone())))
    }

    async fn append_reaction_time(&self, user_id: &UserId, reaction_time: f64) -> Result<ReactionRecord> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(user_id) {
            return Err(ArenaError::UserNotFound(user_id.clone()));
        }
        let record = inner
            .reactions
            .entry(user_id.clone())
            .or_insert_with(|| ReactionRecord::new(user_id.clone()));
        record.push(reaction_time)?;
        Ok(record.clone())
    }

    async fn all_reaction_records(&self) -> Result<Vec<ReactionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.reactions.values().cloned().collect())
    }

    async fn create_match_result(&self, player1: PlayerSnapshot, player2: PlayerSnapshot) -> Result<MatchResult> {
        let result = MatchResult {
            id: uuid::Uuid::new_v4().to_string(),
            player1,
            player2,
            created_at: now_ms(),
        };
        self.inner.write().await.results.push(result.clone());
        debug!("Stored match result {}", result.id);
        Ok(result)
    }

    async fn recent_match_results(&self, limit: usize) -> Result<Vec<MatchResult>> {
        let inner = self.inner.read().await;
        Ok(inner.results.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ROUNDS;

    #[test]
    fn test_find_or_create_user_reuses_name() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let (alice, created) = store.find_or_create_user("alice").await.unwrap();
            assert!(created);

            let (again, created) = store.find_or_create_user("alice").await.unwrap();
            assert!(!created);
            assert_eq!(alice, again);

            store.find_or_create_user("bob").await.unwrap();
            assert_eq!(store.user_count().await, 2);
        });
    }

    #[tokio::test]
    async fn test_append_accumulates_total() {
        let store = MemoryStore::new();
        let (user, _) = store.find_or_create_user("alice").await.unwrap();

        let times = [0.45, 0.312, 30.0, 0.9, 0.001];
        let mut last = ReactionRecord::default();
        for t in times {
            last = store.append_reaction_time(&user.id, t).await.unwrap();
        }

        let expected: f64 = times.iter().sum();
        assert_eq!(last.rounds_recorded(), times.len());
        assert!((last.total_time() - expected).abs() < 1e-9);

        let reversed: f64 = times.iter().rev().sum();
        assert!((last.total_time() - reversed).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_append_refuses_past_ten_rounds() {
        let store = MemoryStore::new();
        let (user, _) = store.find_or_create_user("alice").await.unwrap();
        for _ in 0..ROUNDS {
            store.append_reaction_time(&user.id, 1.0).await.unwrap();
        }
        let err = store.append_reaction_time(&user.id, 1.0).await;
        assert!(matches!(err, Err(ArenaError::RecordFull)));
    }

    #[tokio::test]
    async fn test_append_unknown_user() {
        let store = MemoryStore::new();
        let err = store.append_reaction_time(&"nobody".to_string(), 1.0).await;
        assert!(matches!(err, Err(ArenaError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_reset_clears_record() {
        let store = MemoryStore::new();
        let (user, _) = store.find_or_create_user("alice").await.unwrap();
        store.append_reaction_time(&user.id, 0.5).await.unwrap();

        store.reset_user(&user.id).await.unwrap();

        let record = store.reaction_record(&user.id).await.unwrap();
        assert_eq!(record.rounds_recorded(), 0);
        assert_eq!(record.total_time(), 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let (user, _) = store.find_or_create_user("alice").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..ROUNDS {
            let store = store.clone();
            let id = user.id.clone();
            handles.push(tokio::spawn(async move {
                store.append_reaction_time(&id, 0.5).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = store.reaction_record(&user.id).await.unwrap();
        assert_eq!(record.rounds_recorded(), ROUNDS);
        assert_eq!(record.total_time(), 5.0);
    }

    #[tokio::test]
    async fn test_recent_results_newest_first() {
        let store = MemoryStore::new();
        for i in 0..12 {
            let p1 = PlayerSnapshot {
                id: format!("a{i}"),
                reaction_times: vec![],
                total_time: 0.0,
            };
            let p2 = PlayerSnapshot {
                id: format!("b{i}"),
                reaction_times: vec![],
                total_time: 0.0,
            };
            store.create_match_result(p1, p2).await.unwrap();
        }

        let recent = store.recent_match_results(10).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].player1.id, "a11");
        assert_eq!(recent[9].player1.id, "a2");
        assert_eq!(store.match_count().await, 12);
    }
}
