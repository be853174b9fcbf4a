//! # reaction-arena
//!
//! Two-player real-time reaction game server. Players are paired into
//! rooms, shown the same ten stimulus positions, and scored on how fast
//! they click.
//!
//! ## Features
//!
//! - **Matchmaking**: first open room wins; rooms are deleted once empty
//! - **Round Sync**: lockstep (default) or independent pacing
//! - **Scoring**: per-round reaction times with paired score updates
//! - **Leaderboard**: last matches plus the fastest player by mean time
//!
//! ## Example
//!
//! ```rust,ignore
//! use reaction_arena::{Arena, ArenaConfig, MemoryStore, PacingMode};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArenaConfig::new().pacing(PacingMode::Lockstep);
//!     let arena = Arena::new(config, Arc::new(MemoryStore::new()));
//!     reaction_arena::server::serve(arena).await?;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod finalize;
pub mod registry;
pub mod rooms;
pub mod rounds;
pub mod scores;
pub mod server;


pub use arena::{Arena, SessionStore};
pub use finalize::MatchFinalizer;
pub use reaction_arena_core::*;
pub use registry::{ConnectionRegistry, EventSender};
pub use rooms::{Room, RoomAllocator};
pub use rounds::{MatchState, Phase};
pub use scores::{ScoreTracker, UpdatedTotals};
