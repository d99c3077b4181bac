//! Error types for the greeter service.

use std::net::AddrParseError;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Errors raised while starting or running the service.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid listen address: {0}")]
    Address(#[from] AddrParseError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build {signal} exporter: {message}")]
    Exporter {
        signal: &'static str,
        message: String,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

impl Error {
    pub(crate) fn exporter(signal: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Exporter {
            signal,
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
