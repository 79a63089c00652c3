//! MongoDB backend

use super::Backend;
use crate::config::Config;
use crate::connection::{Scheme, SslMode};
use crate::{Error, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria, Tls, TlsOptions};
use mongodb::{Client, Collection, Database};

/// Document-store backend
///
/// Binds the configured database and, optionally, one collection.
#[derive(Debug, Clone, Default)]
pub struct Mongo {
    collection: Option<String>,
}

impl Mongo {
    /// Backend binding only the database
    pub fn new() -> Self {
        Self::default()
    }

    /// Also bind `name` within the configured database
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }
}

/// Connected MongoDB client with its bound handles
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
    database: Database,
    collection: Option<Collection<Document>>,
}

impl MongoClient {
    /// Underlying driver client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Configured database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Configured collection, if the backend named one
    pub fn collection(&self) -> Option<&Collection<Document>> {
        self.collection.as_ref()
    }
}

/// `ping` against `admin` on the primary
///
/// The driver connects lazily, so the first call also selects a server and
/// authenticates.
async fn ping_primary(client: &Client) -> Result<()> {
    client
        .database("admin")
        .run_command(
            doc! { "ping": 1 },
            SelectionCriteria::ReadPreference(ReadPreference::Primary),
        )
        .await?;
    Ok(())
}

/// Driver TLS setting for an ssl mode; `None` leaves the URI default
fn tls_for(mode: SslMode) -> Option<Tls> {
    if mode.requires_tls() {
        let options = TlsOptions::builder()
            .allow_invalid_certificates(!mode.requires_verification())
            .build();
        Some(Tls::Enabled(options))
    } else if mode == SslMode::Disable {
        Some(Tls::Disabled)
    } else {
        None
    }
}

#[async_trait]
impl Backend for Mongo {
    type Client = MongoClient;

    const NAME: &'static str = "mongodb";
    const SCHEME: Scheme = Scheme::Mongodb;

    async fn open(&self, config: &Config, uri: &str) -> Result<MongoClient> {
        if config.database_name.is_empty() {
            return Err(Error::Config("mongodb requires a database name".into()));
        }

        let mut options = ClientOptions::parse(uri).await?;
        options.connect_timeout = Some(config.timeouts.connect);
        options.server_selection_timeout = Some(config.timeouts.connect);
        if let Some(tls) = config.parse_ssl_mode()?.and_then(tls_for) {
            options.tls = Some(tls);
        }

        let client = Client::with_options(options)?;
        // Server selection, TLS and auth happen here, under the connect deadline
        ping_primary(&client).await?;
        tracing::debug!("mongodb server selected");

        let database = client.database(&config.database_name);
        let collection = self
            .collection
            .as_deref()
            .map(|name| database.collection::<Document>(name));

        Ok(MongoClient {
            client,
            database,
            collection,
        })
    }

    async fn ping(&self, client: &MongoClient) -> Result<()> {
        ping_primary(&client.client).await
    }
}
