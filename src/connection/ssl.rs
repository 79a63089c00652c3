//! SSL mode for datastore connections.
//!
//! The mode is carried verbatim in the Postgres connection URI (`?sslmode=`)
//! and mapped onto the driver TLS options for MongoDB.

use crate::{Error, Result};

/// SSL/TLS connection mode matching PostgreSQL `sslmode` parameter.
///
/// Controls whether and how TLS is negotiated with the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// No TLS (plaintext connection)
    Disable,
    /// Plaintext first, TLS only if the server insists
    Allow,
    /// TLS first, plaintext if the server does not support it
    #[default]
    Prefer,
    /// TLS required, but server certificate is not verified
    Require,
    /// TLS required, server certificate must be signed by a trusted CA
    VerifyCa,
    /// TLS required, server certificate must be signed by a trusted CA and hostname must match
    VerifyFull,
}

impl SslMode {
    /// Whether this mode requires certificate verification (CA or full)
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyFull)
    }

    /// Whether the connection must be encrypted
    pub fn requires_tls(&self) -> bool {
        matches!(self, Self::Require | Self::VerifyCa | Self::VerifyFull)
    }

    /// The `sslmode` keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            _ => Err(Error::Config(format!(
                "invalid sslmode '{}': expected disable, allow, prefer, require, verify-ca, or verify-full",
                s
            ))),
        }
    }
}

impl From<SslMode> for String {
    fn from(mode: SslMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Parse an optional sslmode value, treating `None` as "not configured"
pub(crate) fn parse_optional(value: Option<&str>) -> Result<Option<SslMode>> {
    value.map(str::parse).transpose()
}
