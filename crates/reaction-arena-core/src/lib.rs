//! # reaction-arena-core
//!
//! Transport-free building blocks of reaction-arena.
//!
//! ## Contents
//!
//! - **Data model**: users, reaction records, match results
//! - **Round plans**: seeded stimulus positions for a ten-round match
//! - **Wire protocol**: `{"event", "data"}` frames in both directions
//! - **Persistence**: the `Store` trait plus `MemoryStore`
//! - **Leaderboard**: recent matches and the fastest player by mean time
//!
//! ## Example
//!
//! ```rust,ignore
//! use reaction_arena_core::{ArenaConfig, MemoryStore, RoundPlan, Store};
//!
//! let config = ArenaConfig::default();
//! let plan = RoundPlan::generate(reaction_arena_core::generate_seed(), &config);
//! println!("first stimulus at {:?}", plan.position(0));
//!
//! let store = MemoryStore::new();
//! let (user, created) = store.find_or_create_user("alice").await?;
//! let record = store.append_reaction_time(&user.id, 0.45).await?;
//! assert_eq!(record.total_time(), 0.45);
//! ```

pub mod error;
pub mod leaderboard;
pub mod plan;
pub mod protocol;
pub mod store;
pub mod types;

pub use error::{ArenaError, Result};
pub use leaderboard::{HighestScorer, Leaderboard, MatchSummary};
pub use plan::RoundPlan;
pub use protocol::{ClientEvent, ServerEvent};
pub use store::{MemoryStore, Store};
pub use types::*;
