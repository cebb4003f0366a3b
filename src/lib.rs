//! dbping: connectivity check for Postgres.
//!
//! Reads credentials from the environment, optionally launches a local
//! embedded Postgres, and pings it once with a deadline.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> dbping::Result<()> {
//! use dbping::config::ProcessEnv;
//! use dbping::run::{run, RunOptions};
//! use dbping::server::EmbeddedLauncher;
//!
//! let report = run(&RunOptions::default(), &ProcessEnv, &EmbeddedLauncher::default()).await?;
//! println!("ping took {:?}", report.elapsed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod run;
pub mod server;

pub use error::{Error, Result};
