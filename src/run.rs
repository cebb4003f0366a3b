//! End-to-end connectivity check
//!
//! load config → start server (optional) → build connection string → open
//! client → ping with deadline → stop server.

use crate::client::{connection_string, Pinger, DEFAULT_TIMEOUT};
use crate::config::{EnvSource, PgConfig};
use crate::server::{LaunchSettings, LogSink, RunningServer, ServerLauncher};
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Options for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Health-check deadline
    pub timeout: Duration,
    /// Launch a local server before pinging
    pub launch_server: bool,
    /// Data directory override for the launched server
    pub data_dir: Option<PathBuf>,
    /// Launcher log output
    pub server_logs: LogSink,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            launch_server: true,
            data_dir: None,
            server_logs: LogSink::Discard,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReport {
    /// Round-trip time of the health check
    pub elapsed: Duration,
    /// Redacted URL of the launched server, if one was launched
    pub server_url: Option<String>,
}

/// Run the check
///
/// A launched server is stopped on every path once it has started. If the
/// check failed, a stop failure is only logged and the check's error is
/// returned.
pub async fn run<E, L>(options: &RunOptions, env: &E, launcher: &L) -> Result<PingReport>
where
    E: EnvSource + ?Sized,
    L: ServerLauncher,
{
    let config = PgConfig::from_env(env)?;
    config.port_number()?;
    tracing::debug!(?config, "configuration loaded");

    if !options.launch_server {
        let elapsed = check(&config, options.timeout).await?;
        return Ok(PingReport {
            elapsed,
            server_url: None,
        });
    }

    let settings = LaunchSettings::from_config(&config, options.data_dir.clone())?
        .log_sink(options.server_logs);
    let server = launcher.start(&settings).await?;
    let server_url = server.redacted_url();
    tracing::info!(url = %server_url, "postgres is running");

    let outcome = check(&config, options.timeout).await;
    let stopped = server.stop().await;

    match (outcome, stopped) {
        (Ok(elapsed), Ok(())) => Ok(PingReport {
            elapsed,
            server_url: Some(server_url),
        }),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), stopped) => {
            if let Err(stop_err) = stopped {
                tracing::warn!(error = %stop_err, "failed to stop postgres after failed check");
            }
            Err(e)
        }
    }
}

/// Open a client for the configuration and ping it
async fn check(config: &PgConfig, timeout: Duration) -> Result<Duration> {
    let pinger = Pinger::open(&connection_string(config), config.sslrootcert.as_deref())?;
    pinger.ping(timeout).await
}
