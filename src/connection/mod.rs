//! Connection security
//!
//! This module handles:
//! * `sslmode` parsing and display
//! * TLS configuration and certificate-verification policy per mode

mod tls;

pub use tls::{SslMode, TlsConfig, TlsConfigBuilder};
