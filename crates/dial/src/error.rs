use std::time::Duration;

use race::{BoxError, RaceError};
use thiserror::Error;

/// Why a single candidate connection was rejected.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    #[error("peek {wanted} bytes from {peer}: {source}")]
    Peek {
        wanted: usize,
        peer: String,
        source: std::io::Error,
    },

    #[error("peek {wanted} bytes from {peer}: got only {got} before the stream closed")]
    ShortRead {
        wanted: usize,
        peer: String,
        got: usize,
    },

    #[error("peek {wanted} bytes from {peer}: wanted '{expected}', got (hex) '{got_hex}'")]
    Mismatch {
        wanted: usize,
        peer: String,
        expected: String,
        got_hex: String,
    },
}

/// The SRV lookup itself failed. This is the condition that sends callers
/// down the direct-connection path.
#[derive(Error, Debug)]
#[error("SRV lookup for {name} failed: {source}")]
pub struct LookupError {
    pub name: String,
    #[source]
    pub source: BoxError,
}

impl LookupError {
    pub fn new(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DialError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("SRV records for {name} say the service is not available")]
    Unavailable { name: String },

    #[error("no SRV target of {name} could be used: {source}")]
    Race {
        name: String,
        #[source]
        source: RaceError,
    },

    #[error("direct connect to {target}: {source}")]
    Fallback {
        target: String,
        source: std::io::Error,
    },

    #[error("direct connect to {target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },
}

impl DialError {
    /// True when the failure happened before any connection was attempted
    /// because the SRV lookup did not succeed.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }
}

pub type Result<T> = std::result::Result<T, DialError>;
