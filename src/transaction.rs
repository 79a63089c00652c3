//! Single-statement transactions
//!
//! [`transact`] runs one prepared statement inside one transaction:
//!
//! * begin, applying [`TxOptions`]
//! * execute the statement once with the supplied arguments
//! * commit on success
//! * roll back on failure; a failed rollback is logged at WARN and the
//!   execution error is returned
//!
//! Atomicity comes from the database; no in-process lock is taken, and
//! concurrent calls are independent.

use crate::error::TxStage;
use crate::metrics::{counters, labels};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// READ UNCOMMITTED
    ReadUncommitted,
    /// READ COMMITTED
    ReadCommitted,
    /// REPEATABLE READ
    RepeatableRead,
    /// SERIALIZABLE
    Serializable,
}

/// Options applied when a transaction is opened
///
/// The default leaves the server's isolation level and access mode untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Isolation level (server default when `None`)
    pub isolation: Option<IsolationLevel>,
    /// Open the transaction READ ONLY
    pub read_only: bool,
}

impl TxOptions {
    /// Server defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set isolation level
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Set access mode
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// A prepared statement
///
/// Cheap to clone. The backend keeps the server-side prepared form cached per
/// connection, so one `Statement` can be executed any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: Arc<str>,
}

impl Statement {
    /// Wrap SQL text
    pub fn new(sql: impl Into<Arc<str>>) -> Self {
        Self { sql: sql.into() }
    }

    /// SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A client that can open transactions
#[async_trait]
pub trait Transactional: Send + Sync {
    /// Bound statement arguments
    type Args: Send;

    /// Open transaction
    type Tx: Tx<Args = Self::Args>;

    /// Open a transaction with `options` applied
    async fn begin(&self, options: &TxOptions) -> Result<Self::Tx>;
}

/// An open transaction
#[async_trait]
pub trait Tx: Send + Sized {
    /// Bound statement arguments
    type Args: Send;

    /// Execute `statement` with `args`, returning the number of affected rows
    async fn exec(&mut self, statement: &Statement, args: Self::Args) -> Result<u64>;

    /// Commit
    async fn commit(self) -> Result<()>;

    /// Roll back
    async fn rollback(self) -> Result<()>;
}

/// Execute `statement` once inside a transaction opened on `client`
///
/// Returns the number of affected rows. Errors are reported as
/// [`Error::Transaction`] tagged with the failed [`TxStage`]; a rollback
/// failure never replaces the execution error.
pub async fn transact<T>(
    client: &T,
    options: &TxOptions,
    statement: &Statement,
    args: T::Args,
) -> Result<u64>
where
    T: Transactional + ?Sized,
{
    async {
        let mut tx = match client.begin(options).await {
            Ok(tx) => tx,
            Err(e) => {
                counters::transaction_completed(labels::TX_BEGIN_FAILED);
                return Err(Error::transaction(TxStage::Begin, e));
            }
        };

        match tx.exec(statement, args).await {
            Ok(rows) => {
                if let Err(e) = tx.commit().await {
                    counters::transaction_completed(labels::TX_COMMIT_FAILED);
                    return Err(Error::transaction(TxStage::Commit, e));
                }
                tracing::debug!(rows, "transaction committed");
                counters::transaction_completed(labels::TX_COMMITTED);
                Ok(rows)
            }
            Err(exec_err) => {
                tracing::debug!(error = %exec_err, "statement failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "could not roll back transaction");
                    counters::rollback_failed();
                }
                counters::transaction_completed(labels::TX_ROLLED_BACK);
                Err(Error::transaction(TxStage::Exec, exec_err))
            }
        }
    }
    .instrument(tracing::debug_span!("transact", statement = %statement.sql()))
    .await
}
