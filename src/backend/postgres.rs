//! Postgres backend (sqlx)

use super::Backend;
use crate::config::Config;
use crate::connection::Scheme;
use crate::transaction::{IsolationLevel, Statement, Transactional, Tx, TxOptions};
use crate::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Connection as _;
use std::str::FromStr;

/// Relational backend
///
/// The client is a sqlx [`PgPool`]. The pool size is a fixed cap; no pooling
/// policy beyond it is applied.
#[derive(Debug, Clone)]
pub struct Postgres {
    max_connections: u32,
}

impl Postgres {
    /// Backend with the default pool cap (10)
    pub fn new() -> Self {
        Self {
            max_connections: 10,
        }
    }

    /// Set the pool cap
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

impl Default for Postgres {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for Postgres {
    type Client = PgPool;

    const NAME: &'static str = "postgres";
    const SCHEME: Scheme = Scheme::Postgres;

    async fn open(&self, config: &Config, uri: &str) -> Result<PgPool> {
        // The URI format carries no database; select it on the parsed options
        let mut options = PgConnectOptions::from_str(uri)?;
        if !config.database_name.is_empty() {
            options = options.database(&config.database_name);
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(config.timeouts.connect)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    async fn ping(&self, client: &PgPool) -> Result<()> {
        let mut conn = client.acquire().await?;
        conn.ping().await?;
        Ok(())
    }
}

impl IsolationLevel {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// `SET TRANSACTION` statement applying `options`, if any apply
fn set_transaction_sql(options: &TxOptions) -> Option<String> {
    let mut modes = Vec::new();
    if let Some(level) = options.isolation {
        modes.push(format!("ISOLATION LEVEL {}", level.as_sql()));
    }
    if options.read_only {
        modes.push("READ ONLY".to_string());
    }
    if modes.is_empty() {
        None
    } else {
        Some(format!("SET TRANSACTION {}", modes.join(", ")))
    }
}

#[async_trait]
impl Transactional for PgPool {
    type Args = PgArguments;
    type Tx = sqlx::Transaction<'static, sqlx::Postgres>;

    async fn begin(&self, options: &TxOptions) -> Result<Self::Tx> {
        let mut tx = PgPool::begin(self).await?;
        if let Some(sql) = set_transaction_sql(options) {
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        Ok(tx)
    }
}

#[async_trait]
impl Tx for sqlx::Transaction<'static, sqlx::Postgres> {
    type Args = PgArguments;

    async fn exec(&mut self, statement: &Statement, args: PgArguments) -> Result<u64> {
        let done = sqlx::query_with(statement.sql(), args)
            .persistent(true)
            .execute(&mut **self)
            .await?;
        Ok(done.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        sqlx::Transaction::commit(self).await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        sqlx::Transaction::rollback(self).await?;
        Ok(())
    }
}
