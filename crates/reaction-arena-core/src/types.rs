//! Type definitions for reaction-arena

use crate::error::{ArenaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Rounds per match
pub const ROUNDS: usize = 10;

/// Persistent user identifier, assigned by the store
pub type UserId = String;

/// Room identifier (6 chars)
pub type RoomId = String;

/// Identifier of one live connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How rounds advance once a match is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
    /// Next position goes out only after every connected player finished the round
    #[default]
    Lockstep,
    /// Each player gets the next position as soon as they finish the round
    Independent,
}

impl FromStr for PacingMode {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lockstep" => Ok(PacingMode::Lockstep),
            "independent" => Ok(PacingMode::Independent),
            other => Err(ArenaError::InvalidConfig(format!("unknown pacing mode: {other}"))),
        }
    }
}

/// Arena configuration
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Address the WebSocket server listens on (default: 0.0.0.0:3000)
    pub bind_addr: SocketAddr,
    /// Client-side round countdown in seconds; a miss is reported as this value (default: 30)
    pub round_timeout: f64,
    /// Virtual canvas width (default: 500)
    pub canvas_width: u32,
    /// Virtual canvas height (default: 400)
    pub canvas_height: u32,
    /// Stimulus edge length, keeps positions inside the canvas (default: 50)
    pub stimulus_size: u32,
    /// Number of recent matches on the leaderboard (default: 10)
    pub leaderboard_size: usize,
    /// Round pacing (default: Lockstep)
    pub pacing: PacingMode,
    /// Longest accepted username in chars (default: 32)
    pub max_username_len: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            round_timeout: 30.0,
            canvas_width: 500,
            canvas_height: 400,
            stimulus_size: 50,
            leaderboard_size: 10,
            pacing: PacingMode::Lockstep,
            max_username_len: 32,
        }
    }
}

impl ArenaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn round_timeout(mut self, secs: f64) -> Self {
        self.round_timeout = secs;
        self
    }

    pub fn canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    pub fn stimulus_size(mut self, size: u32) -> Self {
        self.stimulus_size = size;
        self
    }

    pub fn leaderboard_size(mut self, n: usize) -> Self {
        self.leaderboard_size = n;
        self
    }

    pub fn pacing(mut self, mode: PacingMode) -> Self {
        self.pacing = mode;
        self
    }

    pub fn max_username_len(mut self, n: usize) -> Self {
        self.max_username_len = n;
        self
    }

    /// Defaults overlaid with `ARENA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Recognised keys: `ARENA_BIND` (or `PORT` for the port alone),
    /// `ARENA_PACING`, `ARENA_ROUND_TIMEOUT`, `ARENA_LEADERBOARD_SIZE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("ARENA_BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|e| ArenaError::InvalidConfig(format!("ARENA_BIND={bind}: {e}")))?;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| ArenaError::InvalidConfig(format!("PORT={port}: {e}")))?;
            config.bind_addr.set_port(port);
        }

        if let Some(pacing) = lookup("ARENA_PACING") {
            config.pacing = pacing.parse()?;
        }

        if let Some(timeout) = lookup("ARENA_ROUND_TIMEOUT") {
            let secs: f64 = timeout
                .parse()
                .map_err(|e| ArenaError::InvalidConfig(format!("ARENA_ROUND_TIMEOUT={timeout}: {e}")))?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ArenaError::InvalidConfig(format!(
                    "ARENA_ROUND_TIMEOUT must be positive, got {timeout}"
                )));
            }
            config.round_timeout = secs;
        }

        if let Some(size) = lookup("ARENA_LEADERBOARD_SIZE") {
            config.leaderboard_size = size
                .parse()
                .map_err(|e| ArenaError::InvalidConfig(format!("ARENA_LEADERBOARD_SIZE={size}: {e}")))?;
        }

        Ok(config)
    }
}

/// Stimulus position on the virtual canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Fewer than two players, open for matchmaking
    #[default]
    Waiting,
    /// Match running, closed to newcomers
    Playing,
    /// Every connected player finished all rounds
    Complete,
}

/// Persistent user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// Who is behind a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: String,
}

/// Per-user reaction times for the current match.
///
/// The total is always reconstructed from the sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub user_id: UserId,
    pub reaction_times: Vec<f64>,
}

impl ReactionRecord {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            reaction_times: Vec::new(),
        }
    }

    /// Append one round; refuses an eleventh entry
    pub fn push(&mut self, reaction_time: f64) -> Result<()> {
        if self.reaction_times.len() >= ROUNDS {
            return Err(ArenaError::RecordFull);
        }
        self.reaction_times.push(reaction_time);
        Ok(())
    }

    pub fn total_time(&self) -> f64 {
        self.reaction_times.iter().sum()
    }

    pub fn latest(&self) -> Option<f64> {
        self.reaction_times.last().copied()
    }

    /// Mean reaction time, `None` for an empty record
    pub fn mean(&self) -> Option<f64> {
        if self.reaction_times.is_empty() {
            None
        } else {
            Some(self.total_time() / self.reaction_times.len() as f64)
        }
    }

    pub fn rounds_recorded(&self) -> usize {
        self.reaction_times.len()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.user_id.clone(),
            reaction_times: self.reaction_times.clone(),
            total_time: self.total_time(),
        }
    }
}

/// One player's frozen record inside a match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: UserId,
    pub reaction_times: Vec<f64>,
    pub total_time: f64,
}

/// Immutable result of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub id: String,
    pub player1: PlayerSnapshot,
    pub player2: PlayerSnapshot,
    pub created_at: u64,
}

/// Generate a random seed
pub fn generate_seed() -> u64 {
    use rand::Rng;
    rand::thread_rng().r#gen()
}

/// Generate a room ID (6 chars). Callers check for collisions.
pub fn generate_room_id() -> RoomId {
    use rand::Rng;
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

/// Current time in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ArenaConfig::new();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.round_timeout, 30.0);
        assert_eq!((config.canvas_width, config.canvas_height), (500, 400));
        assert_eq!(config.leaderboard_size, 10);
        assert_eq!(config.pacing, PacingMode::Lockstep);
    }

    #[test]
    fn test_config_builder() {
        let config = ArenaConfig::new()
            .pacing(PacingMode::Independent)
            .round_timeout(5.0)
            .canvas(300, 200)
            .stimulus_size(20)
            .leaderboard_size(3);

        assert_eq!(config.pacing, PacingMode::Independent);
        assert_eq!(config.round_timeout, 5.0);
        assert_eq!(config.canvas_width, 300);
        assert_eq!(config.stimulus_size, 20);
        assert_eq!(config.leaderboard_size, 3);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ArenaConfig::from_lookup(|key| match key {
            "PORT" => Some("8080".to_string()),
            "ARENA_PACING" => Some("Independent".to_string()),
            "ARENA_ROUND_TIMEOUT" => Some("12.5".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.pacing, PacingMode::Independent);
        assert_eq!(config.round_timeout, 12.5);
    }

    #[test]
    fn test_config_from_lookup_rejects_garbage() {
        let err = ArenaConfig::from_lookup(|key| (key == "ARENA_PACING").then(|| "sometimes".to_string()));
        assert!(matches!(err, Err(ArenaError::InvalidConfig(_))));

        let err = ArenaConfig::from_lookup(|key| (key == "ARENA_ROUND_TIMEOUT").then(|| "-1".to_string()));
        assert!(matches!(err, Err(ArenaError::InvalidConfig(_))));
    }

    #[test]
    fn test_reaction_record_totals() {
        let mut record = ReactionRecord::new("u1");
        for t in [0.45, 0.6, 30.0, 0.125] {
            record.push(t).unwrap();
        }
        assert!((record.total_time() - 31.175).abs() < 1e-9);
        assert_eq!(record.latest(), Some(0.125));
        assert_eq!(record.rounds_recorded(), 4);
    }

    #[test]
    fn test_reaction_record_caps_at_rounds() {
        let mut record = ReactionRecord::new("u1");
        for _ in 0..ROUNDS {
            record.push(1.0).unwrap();
        }
        assert!(matches!(record.push(1.0), Err(ArenaError::RecordFull)));
        assert_eq!(record.rounds_recorded(), ROUNDS);
    }

    #[test]
    fn test_reaction_record_mean() {
        assert_eq!(ReactionRecord::new("u1").mean(), None);

        let mut record = ReactionRecord::new("u1");
        record.push(0.5).unwrap();
        record.push(1.5).unwrap();
        assert_eq!(record.mean(), Some(1.0));
    }

    #[test]
    fn test_room_id_shape() {
        let id = generate_room_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
