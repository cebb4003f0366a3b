//! Command-line interface

use crate::run::RunOptions;
use crate::server::LogSink;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Check that a Postgres server is reachable.
///
/// Credentials come from PG_USER, PG_PASSWORD, PG_HOST, PG_PORT and
/// PG_DATABASE; PG_SSLMODE and PG_SSLROOTCERT are optional.
#[derive(Debug, Parser)]
#[command(name = "dbping", version, about, long_about = None)]
pub struct Cli {
    /// Timeout for the connection to postgres (e.g. 5s, 250ms, 1m30s)
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Ping the configured host without launching an embedded server
    #[arg(long)]
    pub no_embedded: bool,

    /// Data directory for the embedded server [default: the database name]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Show the embedded server's own log output
    #[arg(long)]
    pub server_logs: bool,
}

impl Cli {
    /// Options for [`crate::run::run`]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            timeout: self.timeout,
            launch_server: !self.no_embedded,
            data_dir: self.data_dir.clone(),
            server_logs: self.log_sink(),
        }
    }

    /// Sink for the embedded server's log output
    pub fn log_sink(&self) -> LogSink {
        if self.server_logs {
            LogSink::Tracing
        } else {
            LogSink::Discard
        }
    }
}

/// Parse a Go-style duration such as `5s`, `1.5s`, `300ms` or `1h2m3s`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is allowed;
/// negative durations are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let input = s.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.starts_with('-') {
        return Err(format!("negative duration \"{}\"", s));
    }
    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.is_empty() {
        return Err(format!("invalid duration \"{}\"", s));
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return Err(format!("invalid duration \"{}\"", s));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration \"{}\"", s))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration \"{}\"", s)),
            other => return Err(format!("unknown unit \"{}\" in duration \"{}\"", other, s)),
        };

        total_nanos += value * scale;
        rest = tail;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(format!("invalid duration \"{}\": overflow", s));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
