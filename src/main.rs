//! reaction-arena server

use reaction_arena::{Arena, ArenaConfig, MemoryStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ArenaConfig::from_env()?;
    info!(
        "Pacing: {:?}, round timeout: {}s, leaderboard: {} matches",
        config.pacing, config.round_timeout, config.leaderboard_size
    );

    let arena = Arena::new(config, Arc::new(MemoryStore::new()));
    reaction_arena::server::serve(arena).await?;
    Ok(())
}
