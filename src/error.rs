//! Error types for datastore

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Stage of a transaction at which an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    /// Opening the transaction (including `SET TRANSACTION`)
    Begin,
    /// Executing the statement
    Exec,
    /// Committing
    Commit,
}

impl std::fmt::Display for TxStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Exec => write!(f, "exec"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Main error type for datastore operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (incomplete or malformed connection parameters)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connection error reported by a backend without a typed source
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Postgres client error
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// MongoDB client error
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Operation exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Deadline that elapsed
        after: Duration,
    },

    /// Liveness check failed
    #[error("liveness check failed: {0}")]
    Liveness(#[source] Box<Error>),

    /// Operation requires a connected datastore
    #[error("datastore is not connected")]
    NotConnected,

    /// The one connection attempt for this datastore failed; it is never retried
    #[error("datastore connection failed: {0}")]
    ConnectFailed(#[source] Arc<Error>),

    /// Transaction step failed
    #[error("transaction {stage} failed: {source}")]
    Transaction {
        /// Step that failed
        stage: TxStage,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Invalid state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an error as a failure of the given transaction stage
    pub fn transaction(stage: TxStage, source: Error) -> Self {
        Error::Transaction {
            stage,
            source: Box::new(source),
        }
    }

    /// Stable, low-cardinality label for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Connection(_) => "connection",
            Error::Io(_) => "io",
            Error::Postgres(_) => "postgres",
            Error::Mongo(_) => "mongo",
            Error::Timeout { .. } => "timeout",
            Error::Liveness(_) => "liveness",
            Error::NotConnected => "not_connected",
            Error::ConnectFailed(_) => "connect_failed",
            Error::Transaction { .. } => "transaction",
            Error::InvalidState { .. } => "invalid_state",
        }
    }

    /// Returns true if the datastore can never reach the connected state
    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::ConnectFailed(_))
    }

    /// Stage of the failed transaction, if this is a transaction error
    pub fn tx_stage(&self) -> Option<TxStage> {
        match self {
            Error::Transaction { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
