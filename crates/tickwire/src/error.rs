//! Unified error type for Tickwire.

use std::path::PathBuf;

use tickwire_dispatch::DispatchError;
use tickwire_protocol::ProtocolError;
use tickwire_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum TickwireError {
    /// Connecting, reading or writing failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The dispatcher could not be set up.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The configuration text is not valid.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The logging subscriber could not be installed.
    #[error("logging init failed: {0}")]
    Logging(String),
}
