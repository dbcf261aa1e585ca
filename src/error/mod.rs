//! Error types for the GSLB server.
//!
//! Mirrors the error-handling design in spec.md §7: configuration errors on
//! the initial load are fatal, everything else is swallowed at its layer
//! boundary and converted into either an RCODE or a logged skip. `dns`
//! carries the DNS-transport mapping, `config` the startup-load mapping.

pub mod config;
pub mod dns;

pub type Result<T> = std::result::Result<T, GslbError>;

/// Top-level error type for anything that can abort startup.
#[derive(Debug)]
pub enum GslbError {
    Config(config::ConfigError),
    Io(std::io::Error),
    Bind(std::io::Error),
}

impl std::fmt::Display for GslbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {}", err),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Bind(err) => write!(f, "failed to bind listener: {}", err),
        }
    }
}

impl std::error::Error for GslbError {}

impl From<config::ConfigError> for GslbError {
    fn from(err: config::ConfigError) -> Self {
        GslbError::Config(err)
    }
}

impl From<std::io::Error> for GslbError {
    fn from(err: std::io::Error) -> Self {
        GslbError::Io(err)
    }
}
