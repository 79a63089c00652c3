//! Backend drivers
//!
//! A [`Backend`] knows how to turn a [`Config`] into a connected client for one
//! kind of database and how to probe that client for liveness. The connect-once
//! lifecycle around it lives in [`Store`](crate::Store) and is shared by every
//! backend.

mod mongo;
mod postgres;

pub use mongo::{Mongo, MongoClient};
pub use postgres::Postgres;

use crate::config::Config;
use crate::connection::{uri, Scheme};
use crate::Result;
use async_trait::async_trait;

/// A database client library, seen from the connection lifecycle
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Connected client handle, read-shared once connected
    type Client: Send + Sync + 'static;

    /// Short name used in logs and metrics
    const NAME: &'static str;

    /// URI scheme of this backend
    const SCHEME: Scheme;

    /// Build the connection URI for this backend
    fn connection_uri(&self, config: &Config) -> String {
        uri::build(Self::SCHEME, config)
    }

    /// Open a client for `uri`
    ///
    /// Called at most once per datastore, under the config's connect deadline.
    /// Drivers that connect lazily must reach the server here, so that slow
    /// handshakes are bounded by the connect deadline and not the ping one.
    async fn open(&self, config: &Config, uri: &str) -> Result<Self::Client>;

    /// Issue one liveness probe against an open client
    ///
    /// Called under the config's ping deadline.
    async fn ping(&self, client: &Self::Client) -> Result<()>;
}
