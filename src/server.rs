//! Local Postgres server launcher
//!
//! [`ServerLauncher`] is the seam between the check and whatever provides a
//! running server. [`EmbeddedLauncher`] installs and runs a throwaway
//! PostgreSQL through `postgresql_embedded`.

use crate::config::PgConfig;
use crate::{metrics, Error, Result};
use postgresql_embedded::{PostgreSQL, Settings};
use std::future::Future;
use std::path::PathBuf;
use tracing::instrument::WithSubscriber;
use tracing::span::{Attributes, Id, Record};
use tracing::subscriber::Interest;
use tracing::{Dispatch, Event, Metadata, Subscriber};
use tracing_subscriber::filter::{Directive, EnvFilter};

/// Where the launcher's own diagnostic output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogSink {
    /// Suppressed
    #[default]
    Discard,
    /// Forwarded to the tracing subscriber
    Tracing,
}

impl LogSink {
    /// Tracing targets used by the embedded server crates
    pub const TARGETS: [&'static str; 3] = [
        "postgresql_embedded",
        "postgresql_archive",
        "postgresql_commands",
    ];

    /// `EnvFilter` directives implementing this sink
    pub fn filter_directives(&self) -> Vec<String> {
        match self {
            LogSink::Discard => Self::TARGETS
                .iter()
                .map(|target| format!("{}=off", target))
                .collect(),
            LogSink::Tracing => Vec::new(),
        }
    }

    /// Add this sink's directives to a filter, on top of whatever it already holds
    pub fn apply(&self, mut filter: EnvFilter) -> EnvFilter {
        for directive in self.filter_directives() {
            if let Ok(directive) = directive.parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    /// Dispatcher to run the launcher under, given the caller's current one
    pub fn dispatch(&self, current: Dispatch) -> Dispatch {
        match self {
            LogSink::Discard => Dispatch::new(DiscardTargets { inner: current }),
            LogSink::Tracing => current,
        }
    }

    fn is_launcher_target(target: &str) -> bool {
        Self::TARGETS.iter().any(|prefix| {
            target
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

/// Forwards to `inner`, dropping spans and events from the launcher crates
struct DiscardTargets {
    inner: Dispatch,
}

impl Subscriber for DiscardTargets {
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        if LogSink::is_launcher_target(metadata.target()) {
            Interest::never()
        } else {
            self.inner.register_callsite(metadata)
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        !LogSink::is_launcher_target(metadata.target()) && self.inner.enabled(metadata)
    }

    fn new_span(&self, span: &Attributes<'_>) -> Id {
        self.inner.new_span(span)
    }

    fn record(&self, span: &Id, values: &Record<'_>) {
        self.inner.record(span, values)
    }

    fn record_follows_from(&self, span: &Id, follows: &Id) {
        self.inner.record_follows_from(span, follows)
    }

    fn event(&self, event: &Event<'_>) {
        if !LogSink::is_launcher_target(event.metadata().target()) {
            self.inner.event(event)
        }
    }

    fn enter(&self, span: &Id) {
        self.inner.enter(span)
    }

    fn exit(&self, span: &Id) {
        self.inner.exit(span)
    }

    fn clone_span(&self, id: &Id) -> Id {
        self.inner.clone_span(id)
    }

    fn try_close(&self, id: Id) -> bool {
        self.inner.try_close(id)
    }
}

/// Settings passed to a launcher
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Superuser name
    pub user: String,
    /// Superuser password
    pub password: String,
    /// Database to make available
    pub database: String,
    /// Data directory
    pub data_dir: PathBuf,
    /// Port to listen on
    pub port: u16,
    /// Launcher log output
    pub log_sink: LogSink,
}

impl LaunchSettings {
    /// Derive launch settings from the connection configuration
    ///
    /// The data directory defaults to a relative path named after the database.
    pub fn from_config(config: &PgConfig, data_dir: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            data_dir: data_dir.unwrap_or_else(|| PathBuf::from(&config.database)),
            port: config.port_number()?,
            log_sink: LogSink::default(),
        })
    }

    /// Set the log sink
    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = sink;
        self
    }
}

impl std::fmt::Debug for LaunchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("data_dir", &self.data_dir)
            .field("port", &self.port)
            .field("log_sink", &self.log_sink)
            .finish()
    }
}

/// Starts a Postgres server
pub trait ServerLauncher {
    /// Handle to the running server
    type Server: RunningServer;

    /// Start a server; fails if it cannot be brought up
    fn start(&self, settings: &LaunchSettings) -> impl Future<Output = Result<Self::Server>>;
}

/// A server started by a [`ServerLauncher`]
pub trait RunningServer {
    /// Connection URL with the password masked
    fn redacted_url(&self) -> String;

    /// Stop the server
    fn stop(self) -> impl Future<Output = Result<()>>;
}

/// Launcher backed by `postgresql_embedded`
#[derive(Debug, Clone, Default)]
pub struct EmbeddedLauncher {
    /// Remove the data directory when the server stops
    pub temporary: bool,
}

impl EmbeddedLauncher {
    fn settings(&self, launch: &LaunchSettings) -> Settings {
        Settings {
            username: launch.user.clone(),
            password: launch.password.clone(),
            data_dir: launch.data_dir.clone(),
            port: launch.port,
            temporary: self.temporary,
            ..Settings::default()
        }
    }
}

impl ServerLauncher for EmbeddedLauncher {
    type Server = EmbeddedServer;

    async fn start(&self, settings: &LaunchSettings) -> Result<EmbeddedServer> {
        let dispatch =
            tracing::dispatcher::get_default(|current| settings.log_sink.dispatch(current.clone()));
        let result = start_embedded(self.settings(settings), &settings.database)
            .with_subscriber(dispatch)
            .await;
        let outcome = if result.is_ok() {
            metrics::labels::OUTCOME_OK
        } else {
            metrics::labels::OUTCOME_ERROR
        };
        metrics::counters::server_started(outcome);
        result
    }
}

async fn start_embedded(settings: Settings, database: &str) -> Result<EmbeddedServer> {
    let mut postgresql = PostgreSQL::new(settings);

    tracing::debug!(data_dir = %postgresql.settings().data_dir.display(), "setting up postgres");
    postgresql
        .setup()
        .await
        .map_err(|e| Error::ServerStart(Box::new(e)))?;
    postgresql
        .start()
        .await
        .map_err(|e| Error::ServerStart(Box::new(e)))?;

    // Created before the server is handed out so a failure here still stops it on drop.
    let server = EmbeddedServer {
        postgresql,
        database: database.to_string(),
    };

    let exists = server
        .postgresql
        .database_exists(database)
        .await
        .map_err(|e| Error::ServerStart(Box::new(e)))?;
    if !exists {
        tracing::debug!(database, "creating database");
        server
            .postgresql
            .create_database(database)
            .await
            .map_err(|e| Error::ServerStart(Box::new(e)))?;
    }

    Ok(server)
}

/// Running embedded server
///
/// Dropping it without calling [`RunningServer::stop`] still stops the
/// instance.
pub struct EmbeddedServer {
    postgresql: PostgreSQL,
    database: String,
}

impl RunningServer for EmbeddedServer {
    fn redacted_url(&self) -> String {
        let settings = self.postgresql.settings();
        redact_url(&settings.url(&self.database), &settings.password)
    }

    async fn stop(self) -> Result<()> {
        self.postgresql
            .stop()
            .await
            .map_err(|e| Error::ServerStop(Box::new(e)))
    }
}

impl std::fmt::Debug for EmbeddedServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedServer")
            .field("url", &self.redacted_url())
            .finish()
    }
}

/// Mask a password inside a URL
pub fn redact_url(url: &str, password: &str) -> String {
    if password.is_empty() {
        return url.to_string();
    }
    url.replacen(&format!(":{}@", password), ":***@", 1)
}
