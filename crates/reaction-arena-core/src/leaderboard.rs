//! Leaderboard computation

use crate::types::{MatchResult, PlayerSnapshot, ReactionRecord, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Match snapshot player with a display name attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPlayer {
    pub id: UserId,
    pub name: Option<String>,
    pub reaction_times: Vec<f64>,
    pub total_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScores {
    pub player1: ScoredPlayer,
    pub player2: ScoredPlayer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: String,
    pub scores: MatchScores,
    pub created_at: u64,
}

/// User with the lowest mean reaction time across all records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestScorer {
    pub player_id: UserId,
    pub name: Option<String>,
    pub average_reaction_time: f64,
}

/// What `showHighestScores` carries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    #[serde(rename = "last10Matches")]
    pub last_matches: Vec<MatchSummary>,
    pub highest_scorer: Option<HighestScorer>,
}

/// Argmin of the per-user mean. Empty records have no mean and are skipped;
/// on an exact tie the first record scanned wins.
pub fn lowest_mean(records: &[ReactionRecord]) -> Option<(&ReactionRecord, f64)> {
    let mut best: Option<(&ReactionRecord, f64)> = None;
    for record in records {
        let Some(mean) = record.mean() else { continue };
        match best {
            Some((_, current)) if mean >= current => {}
            _ => best = Some((record, mean)),
        }
    }
    best
}

/// Every user id referenced by `results`, deduplicated
pub fn referenced_users(results: &[MatchResult]) -> Vec<UserId> {
    results
        .iter()
        .flat_map(|r| [r.player1.id.clone(), r.player2.id.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Attach display names to frozen match results
pub fn summarize(results: &[MatchResult], names: &HashMap<UserId, String>) -> Vec<MatchSummary> {
    let scored = |p: &PlayerSnapshot| ScoredPlayer {
        id: p.id.clone(),
        name: names.get(&p.id).cloned(),
        reaction_times: p.reaction_times.clone(),
        total_time: p.total_time,
    };

    results
        .iter()
        .map(|r| MatchSummary {
            id: r.id.clone(),
            scores: MatchScores {
                player1: scored(&r.player1),
                player2: scored(&r.player2),
            },
            created_at: r.created_at,
        })
        .collect()
}

/// Round to millisecond precision for display
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
