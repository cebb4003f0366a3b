//! Error types for dbping

use std::time::Duration;
use thiserror::Error;

/// Boxed error used at the server-launcher seam
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// One or more required environment variables are unset or empty
    #[error("missing required environment variables: {}", .vars.join(", "))]
    MissingEnv {
        /// Variable names, sorted
        vars: Vec<String>,
    },

    /// `PG_SSLMODE` holds a value outside the recognised set
    #[error(
        "invalid ssl mode \"{value}\": expected one of \"\", \"disable\", \"allow\", \"require\", \"verify-ca\", or \"verify-full\""
    )]
    InvalidSslMode {
        /// Offending value
        value: String,
    },

    /// Other configuration error
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Embedded server failed to launch
    #[error("failed to start postgres server: {0}")]
    ServerStart(#[source] BoxError),

    /// Embedded server failed to stop
    #[error("failed to stop postgres server: {0}")]
    ServerStop(#[source] BoxError),

    /// Client could not be constructed
    #[error("failed to open postgres client: {0}")]
    Client(String),

    /// Connect, authentication or health-check query failed
    #[error("ping failed: {0}")]
    Ping(#[source] tokio_postgres::Error),

    /// Server closed the connection before the health check completed
    ///
    /// Driver errors reporting a closed connection land here rather than in
    /// [`Error::Ping`].
    #[error("connection closed before the health check completed")]
    ConnectionClosed,

    /// Health check did not finish before the deadline
    #[error("ping timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Step of the check that produced this error
    pub fn step(&self) -> &'static str {
        match self {
            Error::MissingEnv { .. } | Error::InvalidSslMode { .. } | Error::Config(_) => {
                "configuration"
            }
            Error::ServerStart(_) | Error::ServerStop(_) => "server",
            Error::Client(_) => "connection",
            Error::Ping(_) | Error::ConnectionClosed | Error::Timeout(_) => "ping",
        }
    }

    /// Whether this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::MissingEnv { .. } | Error::InvalidSslMode { .. } | Error::Config(_)
        )
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.is_closed() {
            Error::ConnectionClosed
        } else {
            Error::Ping(e)
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
