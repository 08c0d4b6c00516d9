//! Error types for command handling and chat storage

use std::time::Duration;
use thiserror::Error;

/// Why a chat command could not be carried out
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Missing or malformed arguments; the text is shown to the invoker
    #[error("{0}")]
    Usage(String),
    /// A free-text target fragment matched more than one player
    #[error("multiple players match that {kind} '{fragment}'")]
    AmbiguousTarget {
        fragment: String,
        kind: TargetKind,
    },
    #[error("unknown weapon '{0}'")]
    UnknownWeapon(String),
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::Usage(message.into())
    }
}

/// Which part of a player's identity an ambiguous fragment was matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    SteamId,
    Name,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::SteamId => f.write_str("partial steamID"),
            TargetKind::Name => f.write_str("name"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to encode player stats: {0}")]
    Encode(#[from] bincode::Error),
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// Whether the same write may succeed if retried later
    ///
    /// Constraint violations and encoding failures are permanent; timeouts,
    /// I/O and pool trouble are not.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Timeout(_) => true,
            StorageError::Encode(_) => false,
            StorageError::Database(err) => match err {
                sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => true,
                sqlx::Error::Database(db) => matches!(db.kind(), sqlx::error::ErrorKind::Other),
                _ => false,
            },
        }
    }
}
