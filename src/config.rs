//! Connection configuration loaded from the environment
//!
//! Required variables are collected in one pass so every missing name is
//! reported together. An invalid `PG_SSLMODE` is reported on its own, ahead of
//! any missing variables.

use crate::connection::SslMode;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Principal name
pub const ENV_USER: &str = "PG_USER";
/// Target database name
pub const ENV_DATABASE: &str = "PG_DATABASE";
/// Server host
pub const ENV_HOST: &str = "PG_HOST";
/// Principal secret
pub const ENV_PASSWORD: &str = "PG_PASSWORD";
/// Server port
pub const ENV_PORT: &str = "PG_PORT";
/// Transport security mode (optional)
pub const ENV_SSLMODE: &str = "PG_SSLMODE";
/// CA bundle for certificate verification (optional)
pub const ENV_SSLROOTCERT: &str = "PG_SSLROOTCERT";

/// Source of configuration values
///
/// `ProcessEnv` reads the real process environment; a `HashMap` works as an
/// in-memory source for tests.
pub trait EnvSource {
    /// Look up a variable. Unset and non-unicode values are both `None`.
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl<E: EnvSource + ?Sized> EnvSource for &E {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// Postgres connection configuration
#[derive(Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// Username
    pub user: String,
    /// Database name
    pub database: String,
    /// Host
    pub host: String,
    /// Password
    pub password: String,
    /// Port, as given in the environment
    pub port: String,
    /// SSL/TLS mode (`None` when unset or empty)
    pub sslmode: Option<SslMode>,
    /// Path to a custom CA certificate bundle
    pub sslrootcert: Option<PathBuf>,
}

impl PgConfig {
    /// Load configuration from an environment source
    pub fn from_env<E: EnvSource + ?Sized>(env: &E) -> Result<Self> {
        let mut missing = Vec::new();

        let mut required = |key: &str| -> String {
            let value = env.get(key).unwrap_or_default();
            if value.is_empty() {
                missing.push(key.to_string());
            }
            value
        };

        let user = required(ENV_USER);
        let database = required(ENV_DATABASE);
        let host = required(ENV_HOST);
        let password = required(ENV_PASSWORD);
        let port = required(ENV_PORT);

        let sslmode = match env.get(ENV_SSLMODE).unwrap_or_default().as_str() {
            "" => None,
            other => Some(
                other
                    .parse::<SslMode>()
                    .map_err(|_| Error::InvalidSslMode {
                        value: other.to_string(),
                    })?,
            ),
        };

        if !missing.is_empty() {
            missing.sort();
            return Err(Error::MissingEnv { vars: missing });
        }

        let sslrootcert = env
            .get(ENV_SSLROOTCERT)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            user,
            database,
            host,
            password,
            port,
            sslmode,
            sslrootcert,
        })
    }

    /// Port as a number
    pub fn port_number(&self) -> Result<u16> {
        self.port
            .parse()
            .map_err(|_| Error::Config(format!("invalid port \"{}\"", self.port)))
    }
}

impl std::fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConfig")
            .field("user", &self.user)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("sslmode", &self.sslmode)
            .field("sslrootcert", &self.sslrootcert)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            ("PG_USER", "alice"),
            ("PG_DATABASE", "mydb"),
            ("PG_HOST", "localhost"),
            ("PG_PASSWORD", "secret"),
            ("PG_PORT", "5432"),
        ])
    }

    #[test]
    fn test_from_env_complete() {
        let config = PgConfig::from_env(&full_env()).unwrap();
        assert_eq!(config.user, "alice");
        assert_eq!(config.database, "mydb");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.password, "secret");
        assert_eq!(config.port, "5432");
        assert_eq!(config.sslmode, None);
        assert_eq!(config.sslrootcert, None);
    }

    #[test]
    fn test_from_env_with_sslmode() {
        let mut vars = full_env();
        vars.insert("PG_SSLMODE".into(), "verify-ca".into());
        let config = PgConfig::from_env(&vars).unwrap();
        assert_eq!(config.sslmode, Some(SslMode::VerifyCa));
    }

    #[test]
    fn test_from_env_empty_sslmode_is_unset() {
        let mut vars = full_env();
        vars.insert("PG_SSLMODE".into(), String::new());
        let config = PgConfig::from_env(&vars).unwrap();
        assert_eq!(config.sslmode, None);
    }

    #[test]
    fn test_missing_host_and_port_sorted() {
        let mut vars = full_env();
        vars.remove("PG_PORT");
        vars.remove("PG_HOST");
        match PgConfig::from_env(&vars) {
            Err(Error::MissingEnv { vars }) => assert_eq!(vars, vec!["PG_HOST", "PG_PORT"]),
            other => panic!("expected MissingEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = full_env();
        vars.insert("PG_PASSWORD".into(), String::new());
        match PgConfig::from_env(&vars) {
            Err(Error::MissingEnv { vars }) => assert_eq!(vars, vec!["PG_PASSWORD"]),
            other => panic!("expected MissingEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_every_missing_subset_reported_sorted() {
        let keys = [ENV_USER, ENV_DATABASE, ENV_HOST, ENV_PASSWORD, ENV_PORT];
        for mask in 1u32..(1 << keys.len()) {
            let mut vars = full_env();
            let mut expected = Vec::new();
            for (i, key) in keys.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    vars.remove(*key);
                    expected.push(key.to_string());
                }
            }
            expected.sort();
            match PgConfig::from_env(&vars) {
                Err(Error::MissingEnv { vars }) => assert_eq!(vars, expected),
                other => panic!("mask {:#b}: expected MissingEnv, got {:?}", mask, other),
            }
        }
    }

    #[test]
    fn test_invalid_sslmode_reported_immediately() {
        let mut vars = full_env();
        vars.insert("PG_SSLMODE".into(), "bogus".into());
        match PgConfig::from_env(&vars) {
            Err(Error::InvalidSslMode { value }) => assert_eq!(value, "bogus"),
            other => panic!("expected InvalidSslMode, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_sslmode_wins_over_missing() {
        let vars = env(&[("PG_SSLMODE", "prefer")]);
        match PgConfig::from_env(&vars) {
            Err(Error::InvalidSslMode { value }) => assert_eq!(value, "prefer"),
            other => panic!("expected InvalidSslMode, got {:?}", other),
        }
    }

    #[test]
    fn test_sslrootcert_optional() {
        let mut vars = full_env();
        vars.insert("PG_SSLROOTCERT".into(), "/etc/ssl/ca.pem".into());
        let config = PgConfig::from_env(&vars).unwrap();
        assert_eq!(config.sslrootcert, Some(PathBuf::from("/etc/ssl/ca.pem")));
    }

    #[test]
    fn test_port_number() {
        let config = PgConfig::from_env(&full_env()).unwrap();
        assert_eq!(config.port_number().unwrap(), 5432);

        let mut vars = full_env();
        vars.insert("PG_PORT".into(), "54x2".into());
        let config = PgConfig::from_env(&vars).unwrap();
        assert!(matches!(config.port_number(), Err(Error::Config(_))));

        vars.insert("PG_PORT".into(), "70000".into());
        let config = PgConfig::from_env(&vars).unwrap();
        assert!(config.port_number().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = PgConfig::from_env(&full_env()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
