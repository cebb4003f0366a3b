//! Postgres client side of the check
//!
//! * connection string building and parsing
//! * the health-check client

pub mod connection_string;
mod pinger;

pub use connection_string::{connection_string, ConnectionInfo, Driver};
pub use pinger::{Pinger, DEFAULT_TIMEOUT, PING_QUERY};
