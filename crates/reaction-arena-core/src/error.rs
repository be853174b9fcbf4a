//! Error types for reaction-arena

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Connection is not registered")]
    NotRegistered,

    #[error("Connection is already registered")]
    AlreadyRegistered,

    #[error("Username is already in a game: {0}")]
    UsernameInUse(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid reaction time: {0}")]
    InvalidReactionTime(f64),

    #[error("Reaction record is full")]
    RecordFull,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArenaError {
    /// Message pushed to the client. Persistence details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ArenaError::StoreUnavailable(_) | ArenaError::UserNotFound(_) => {
                "A storage error occurred. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArenaError>;
