//! Datastore configuration
//!
//! A [`Config`] is plain data: it is built once at startup (from the process
//! environment, from literal values, or from a connection URI) and handed to a
//! datastore, which owns it for the rest of its life.

use crate::connection::{parse_ssl_mode, SslMode};
use crate::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Default deadline for opening a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for a single liveness probe
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadlines applied to network operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Opening the client (default: 10 seconds)
    pub connect: Duration,
    /// Each liveness probe (default: 2 seconds)
    pub ping: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            ping: DEFAULT_PING_TIMEOUT,
        }
    }
}

/// Connection parameters for a datastore
///
/// Fields are kept as strings so that a config read from an incomplete
/// environment can still be represented; use [`Config::validate`] to check
/// completeness.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Server host name or address
    pub host: String,
    /// Server port (accepts an integer or a string when deserialized)
    #[serde(deserialize_with = "port_from_int_or_string")]
    pub port: String,
    /// Username
    #[serde(default)]
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Database name
    #[serde(default, alias = "db")]
    pub database_name: String,
    /// SSL mode keyword (`disable`, `require`, ...)
    #[serde(default, alias = "sslmode")]
    pub ssl_mode: Option<String>,
    /// Network deadlines
    #[serde(skip)]
    pub timeouts: Timeouts,
}

impl Config {
    /// Create a configuration for `host:port` with no credentials
    ///
    /// # Examples
    ///
    /// ```
    /// use datastore::Config;
    ///
    /// let config = Config::new("localhost", 5432)
    ///     .credentials("app", "secret")
    ///     .database("orders")
    ///     .ssl_mode("disable");
    /// assert_eq!(config.port, "5432");
    /// ```
    pub fn new(host: impl Into<String>, port: impl ToString) -> Self {
        Self {
            host: host.into(),
            port: port.to_string(),
            username: String::new(),
            password: String::new(),
            database_name: String::new(),
            ssl_mode: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Read a configuration from the process environment
    ///
    /// Unset variables become empty strings (an unset or empty ssl mode
    /// variable becomes `None`). No error is raised here; call
    /// [`Config::validate`] to check the result.
    pub fn from_env(mapping: &EnvMapping) -> Self {
        Self::from_lookup(mapping, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable lookup
    pub fn from_lookup<F>(mapping: &EnvMapping, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).unwrap_or_default();

        Self {
            host: read(&mapping.host),
            port: read(&mapping.port),
            username: read(&mapping.username),
            password: read(&mapping.password),
            database_name: read(&mapping.db),
            ssl_mode: mapping
                .ssl_mode
                .as_deref()
                .and_then(|name| lookup(name))
                .filter(|value| !value.is_empty()),
            timeouts: Timeouts::default(),
        }
    }

    /// Parse a `postgres://`, `postgresql://` or `mongodb://` connection URI
    pub fn from_uri(uri: &str) -> Result<Self> {
        crate::connection::ConnectionInfo::parse(uri).map(|info| info.config)
    }

    /// Set username and password
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set database name
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Set SSL mode
    pub fn ssl_mode(mut self, mode: impl Into<String>) -> Self {
        self.ssl_mode = Some(mode.into());
        self
    }

    /// Set connect deadline
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.timeouts.connect = duration;
        self
    }

    /// Set liveness probe deadline
    pub fn ping_timeout(mut self, duration: Duration) -> Self {
        self.timeouts.ping = duration;
        self
    }

    /// Port as a number
    pub fn parse_port(&self) -> Result<u16> {
        match self.port.parse::<u16>() {
            Ok(0) | Err(_) => Err(Error::Config(format!("invalid port '{}'", self.port))),
            Ok(port) => Ok(port),
        }
    }

    /// SSL mode as a typed value, `None` when not configured
    pub fn parse_ssl_mode(&self) -> Result<Option<SslMode>> {
        parse_ssl_mode(self.ssl_mode.as_deref())
    }

    /// Check that the configuration is complete enough to connect
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host is empty".into()));
        }
        self.parse_port()?;
        self.parse_ssl_mode()?;
        if self.timeouts.connect.is_zero() || self.timeouts.ping.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("ssl_mode", &self.ssl_mode)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Names of the environment variables holding each connection parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvMapping {
    /// Variable holding the host
    pub host: String,
    /// Variable holding the port
    pub port: String,
    /// Variable holding the username
    pub username: String,
    /// Variable holding the password
    pub password: String,
    /// Variable holding the database name
    pub db: String,
    /// Variable holding the SSL mode, if any
    pub ssl_mode: Option<String>,
}

impl EnvMapping {
    /// Create a mapping from explicit variable names
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        db: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            username: username.into(),
            password: password.into(),
            db: db.into(),
            ssl_mode: None,
        }
    }

    /// Conventional names under a prefix: `{P}_HOST`, `{P}_PORT`, `{P}_USER`,
    /// `{P}_PASSWORD`, `{P}_DB`, `{P}_SSLMODE`
    pub fn with_prefix(prefix: &str) -> Self {
        Self::new(
            format!("{}_HOST", prefix),
            format!("{}_PORT", prefix),
            format!("{}_USER", prefix),
            format!("{}_PASSWORD", prefix),
            format!("{}_DB", prefix),
        )
        .ssl_mode(format!("{}_SSLMODE", prefix))
    }

    /// Set the variable holding the SSL mode
    pub fn ssl_mode(mut self, var: impl Into<String>) -> Self {
        self.ssl_mode = Some(var.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u64),
    Text(String),
}

fn port_from_int_or_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(n) => n.to_string(),
        PortRepr::Text(s) => s,
    })
}
