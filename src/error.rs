//! Unified error type.

use std::net::SocketAddr;
use std::path::PathBuf;

/// The error type returned by tollgate's fallible operations.
///
/// Per-request failures (401, 415, 500, 504, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// startup and infrastructure failures: configuration, the key file, and
/// binding the listener.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load key file {path}: {reason}")]
    Keys { path: PathBuf, reason: String },

    /// The same credential token was registered twice.
    #[error("duplicate credential token in registry")]
    DuplicateKey,
}
