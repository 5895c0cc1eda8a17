//! Logging setup.
//!
//! Everything in the crate logs through the `log` facade; binaries pick the
//! `env_logger` backend through [`init_logging`].

mod init;

pub use init::{LoggingConfig, init_logging, resolve_filter};
