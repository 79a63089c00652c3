//! Connection management
//!
//! This module handles:
//! * Connection lifecycle (connect once, liveness check, permanent failure)
//! * State machine enforcement
//! * Connection URI building and parsing
//! * SSL mode handling

mod ssl;
mod state;
mod store;
pub mod uri;

pub use ssl::SslMode;
pub use state::ConnectionState;
pub use store::{connect_all, Datastore, MongoStore, PostgresStore, Store};
pub use uri::{ConnectionInfo, Scheme};

pub(crate) use ssl::parse_optional as parse_ssl_mode;
