//! Connect-once datastore handle

use super::state::ConnectionState;
use crate::backend::{Backend, Mongo, Postgres};
use crate::config::Config;
use crate::metrics::{counters, histograms};
use crate::transaction::{self, Statement, Transactional, TxOptions};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::Instrument;

/// Datastore backed by Postgres
pub type PostgresStore = Store<Postgres>;

/// Datastore backed by MongoDB
pub type MongoStore = Store<Mongo>;

/// Capability shared by every datastore
///
/// Object safe, so stores of different backends can be connected and probed
/// together (see [`connect_all`]).
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Backend name
    fn name(&self) -> &'static str;

    /// Current lifecycle state
    fn state(&self) -> ConnectionState;

    /// Connect (at most once) and verify liveness
    async fn connect(&self) -> Result<()>;

    /// Probe an established connection
    async fn ping(&self) -> Result<()>;
}

/// Connect every datastore concurrently, failing on the first error
pub async fn connect_all(stores: &[&dyn Datastore]) -> Result<()> {
    futures::future::try_join_all(stores.iter().map(|store| store.connect())).await?;
    Ok(())
}

/// A datastore: one config, one backend, at most one connect attempt
///
/// `Store` is `Send + Sync` and is meant to be shared (typically in an `Arc`).
/// The first call to [`connect`](Store::connect) opens the client and pings it;
/// concurrent callers wait for that attempt and observe its outcome. A failed
/// attempt is final: the store never retries.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> datastore::Result<()> {
/// use datastore::{Config, EnvMapping, PostgresStore, Statement, TxOptions};
/// use sqlx::postgres::PgArguments;
/// use sqlx::Arguments;
///
/// let config = Config::from_env(&EnvMapping::with_prefix("POSTGRES"));
/// let store = PostgresStore::postgres(config);
/// store.connect().await?;
///
/// let stmt = Statement::new("UPDATE accounts SET active = false WHERE id = $1");
/// let mut args = PgArguments::default();
/// args.add(42_i64).expect("encode");
/// store.transact(&TxOptions::default(), &stmt, args).await?;
/// # Ok(())
/// # }
/// ```
pub struct Store<B: Backend> {
    config: Config,
    backend: B,
    client: OnceCell<std::result::Result<B::Client, Arc<Error>>>,
    state: Mutex<ConnectionState>,
}

impl Store<Postgres> {
    /// Postgres datastore with default backend settings
    pub fn postgres(config: Config) -> Self {
        Self::new(config, Postgres::new())
    }
}

impl Store<Mongo> {
    /// MongoDB datastore binding the configured database
    pub fn mongo(config: Config) -> Self {
        Self::new(config, Mongo::new())
    }
}

impl<B: Backend> Store<B> {
    /// Create an unconnected datastore
    pub fn new(config: Config, backend: B) -> Self {
        Self {
            config,
            backend,
            client: OnceCell::new(),
            state: Mutex::new(ConnectionState::Unconnected),
        }
    }

    /// Configuration (immutable for the life of the store)
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Backend driver
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current lifecycle state
    ///
    /// Terminal states are read from the published outcome, so `Connected`
    /// is only reported once [`client`](Store::client) succeeds.
    pub fn state(&self) -> ConnectionState {
        match self.client.get() {
            Some(Ok(_)) => ConnectionState::Connected,
            Some(Err(_)) => ConnectionState::Failed,
            None => match *self.state.lock().unwrap_or_else(PoisonError::into_inner) {
                // Outcome recorded but not yet published
                ConnectionState::Connected | ConnectionState::Failed => {
                    ConnectionState::Connecting
                }
                state => state,
            },
        }
    }

    /// Connected client
    ///
    /// Fails with [`Error::NotConnected`] before a successful connect and with
    /// [`Error::ConnectFailed`] after a failed one.
    pub fn client(&self) -> Result<&B::Client> {
        match self.client.get() {
            Some(Ok(client)) => Ok(client),
            Some(Err(e)) => Err(Error::ConnectFailed(Arc::clone(e))),
            None => Err(Error::NotConnected),
        }
    }

    /// Connect and verify liveness, exactly once
    ///
    /// Every caller, concurrent or later, observes the outcome of the single
    /// attempt.
    pub async fn connect(&self) -> Result<()> {
        match self.client.get_or_init(|| self.establish()).await {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::ConnectFailed(Arc::clone(e))),
        }
    }

    /// Issue a fresh liveness probe against the established client
    ///
    /// Does not change the lifecycle state. The backend is never probed unless
    /// the store is connected.
    pub async fn ping(&self) -> Result<()> {
        let client = self.client()?;
        let started = Instant::now();
        let result = self.probe(client).await;

        histograms::ping_duration(B::NAME, started.elapsed().as_millis() as u64);
        counters::ping_completed(B::NAME, result.is_ok());
        if let Err(ref e) = result {
            tracing::warn!(backend = B::NAME, error = %e, "ping failed");
        }
        result
    }

    async fn establish(&self) -> std::result::Result<B::Client, Arc<Error>> {
        self.set_state(ConnectionState::Connecting);
        counters::connect_attempted(B::NAME);
        let started = Instant::now();

        let span = tracing::info_span!(
            "connect",
            backend = B::NAME,
            host = %self.config.host,
            port = %self.config.port,
        );
        let result = self.connect_and_ping().instrument(span).await;
        histograms::connect_duration(B::NAME, started.elapsed().as_millis() as u64);

        match result {
            Ok(client) => {
                self.set_state(ConnectionState::Connected);
                counters::connect_completed(B::NAME, None);
                tracing::info!(backend = B::NAME, "datastore connected");
                Ok(client)
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                counters::connect_completed(B::NAME, Some(e.category()));
                tracing::error!(backend = B::NAME, error = %e, "datastore connection failed");
                Err(Arc::new(e))
            }
        }
    }

    async fn connect_and_ping(&self) -> Result<B::Client> {
        self.config.validate()?;
        let uri = self.backend.connection_uri(&self.config);

        let deadline = self.config.timeouts.connect;
        let client = tokio::time::timeout(deadline, self.backend.open(&self.config, &uri))
            .await
            .map_err(|_| Error::Timeout {
                operation: "connect",
                after: deadline,
            })??;
        tracing::debug!("client opened");

        self.probe(&client)
            .await
            .map_err(|e| Error::Liveness(Box::new(e)))?;
        tracing::debug!("liveness check passed");

        Ok(client)
    }

    async fn probe(&self, client: &B::Client) -> Result<()> {
        let deadline = self.config.timeouts.ping;
        tokio::time::timeout(deadline, self.backend.ping(client))
            .await
            .map_err(|_| Error::Timeout {
                operation: "ping",
                after: deadline,
            })?
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // A caller dropped mid-connect leaves `Connecting` behind; the next
        // caller resumes from there
        if *state == next {
            return;
        }
        if let Err(e) = state.transition(next) {
            tracing::debug!(error = %e, "ignored lifecycle transition");
        }
    }
}

impl<B> Store<B>
where
    B: Backend,
    B::Client: Transactional,
{
    /// Execute `statement` once inside a transaction
    ///
    /// Commits on success and rolls back on failure. See
    /// [`transact`](crate::transaction::transact).
    pub async fn transact(
        &self,
        options: &TxOptions,
        statement: &Statement,
        args: <B::Client as Transactional>::Args,
    ) -> Result<u64> {
        transaction::transact(self.client()?, options, statement, args).await
    }
}

impl Store<Postgres> {
    /// Check `sql` against the server and return it as a reusable statement
    pub async fn prepare(&self, sql: &str) -> Result<Statement> {
        use sqlx::Executor;

        self.client()?.prepare(sql).await?;
        Ok(Statement::new(sql))
    }
}

#[async_trait]
impl<B: Backend> Datastore for Store<B> {
    fn name(&self) -> &'static str {
        B::NAME
    }

    fn state(&self) -> ConnectionState {
        Store::state(self)
    }

    async fn connect(&self) -> Result<()> {
        Store::connect(self).await
    }

    async fn ping(&self) -> Result<()> {
        Store::ping(self).await
    }
}

impl<B: Backend> std::fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &B::NAME)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Scheme;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        opens: AtomicUsize,
        pings: AtomicUsize,
        fail_open: bool,
        hang_ping: bool,
    }

    #[async_trait]
    impl Backend for Counting {
        type Client = String;

        const NAME: &'static str = "counting";
        const SCHEME: Scheme = Scheme::Postgres;

        async fn open(&self, _config: &Config, uri: &str) -> Result<String> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(Error::Connection("refused".into()));
            }
            Ok(uri.to_string())
        }

        async fn ping(&self, _client: &String) -> Result<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.hang_ping {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    fn config() -> Config {
        Config::new("h", 5432)
            .credentials("u", "p")
            .ssl_mode("disable")
    }

    #[tokio::test]
    async fn test_connect_binds_client() {
        let store = Store::new(config(), Counting::default());
        assert_eq!(store.state(), ConnectionState::Unconnected);
        assert!(matches!(store.client(), Err(Error::NotConnected)));

        store.connect().await.unwrap();

        assert_eq!(store.state(), ConnectionState::Connected);
        assert_eq!(
            store.client().unwrap().as_str(),
            "postgres://u:p@h:5432?sslmode=disable"
        );
        assert_eq!(store.backend().pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_connect_is_noop() {
        let store = Store::new(config(), Counting::default());
        store.connect().await.unwrap();
        store.connect().await.unwrap();

        assert_eq!(store.backend().opens.load(Ordering::SeqCst), 1);
        assert_eq!(store.backend().pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_is_permanent() {
        let backend = Counting {
            fail_open: true,
            ..Default::default()
        };
        let store = Store::new(config(), backend);

        assert!(store.connect().await.unwrap_err().is_permanent());
        assert!(store.connect().await.unwrap_err().is_permanent());

        assert_eq!(store.state(), ConnectionState::Failed);
        assert_eq!(store.backend().opens.load(Ordering::SeqCst), 1);
        assert_eq!(store.backend().pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_connect_without_open() {
        let store = Store::new(Config::new("", 5432), Counting::default());

        let err = store.connect().await.unwrap_err();
        match err {
            Error::ConnectFailed(inner) => assert!(matches!(*inner, Error::Config(_))),
            other => panic!("expected ConnectFailed, got {:?}", other),
        }
        assert_eq!(store.backend().opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ping_before_connect() {
        let store = Store::new(config(), Counting::default());
        assert!(matches!(store.ping().await, Err(Error::NotConnected)));
        assert_eq!(store.backend().pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_timeout_fails_connect() {
        let backend = Counting {
            hang_ping: true,
            ..Default::default()
        };
        let store = Store::new(config().ping_timeout(Duration::from_secs(2)), backend);

        let err = store.connect().await.unwrap_err();
        match err {
            Error::ConnectFailed(inner) => match &*inner {
                Error::Liveness(cause) => {
                    assert!(matches!(**cause, Error::Timeout { operation: "ping", .. }))
                }
                other => panic!("expected Liveness, got {:?}", other),
            },
            other => panic!("expected ConnectFailed, got {:?}", other),
        }
        assert_eq!(store.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_state_never_reports_connected_without_client() {
        let store = Store::new(config(), Counting::default());
        store.set_state(ConnectionState::Connecting);
        store.set_state(ConnectionState::Connected);

        assert_eq!(store.state(), ConnectionState::Connecting);
        assert!(matches!(store.client(), Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_datastore_trait_object() {
        let pg = Store::new(config(), Counting::default());
        let other = Store::new(config(), Counting::default());

        connect_all(&[&pg, &other]).await.unwrap();

        let stores: [&dyn Datastore; 2] = [&pg, &other];
        for store in stores {
            assert_eq!(store.name(), "counting");
            assert_eq!(store.state(), ConnectionState::Connected);
            store.ping().await.unwrap();
        }
    }

    #[test]
    fn test_debug_hides_password() {
        let store = Store::new(config().credentials("u", "s3cret"), Counting::default());
        let debug = format!("{:?}", store);
        assert!(debug.contains("counting"));
        assert!(!debug.contains("s3cret"));
    }
}
