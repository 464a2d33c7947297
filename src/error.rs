//! Error type shared by every layer of the harness.

use std::path::PathBuf;

use thiserror::Error;

use crate::cassette::codec::Request;

/// Boxed error produced by a wrapped RPC client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while recording, replaying or persisting calls.
#[derive(Debug, Error)]
pub enum Error {
    /// A call reached an installed interceptor while no session was active.
    #[error("no cassette is active for this intercepted call")]
    NoCassette,

    /// Playback found no recorded request structurally equal to the call.
    #[error("no recording of {} in cassette {cassette:?}", .request.method())]
    NoRecording {
        /// Name of the cassette that was searched.
        cassette: String,
        /// The encoded request that missed.
        request: Box<Request>,
    },

    /// No cassette file exists for the requested name.
    #[error("cassette {name:?} not found at {}", .path.display())]
    NotFound {
        /// Requested cassette name.
        name: String,
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The stored schema version is not the one this engine reads.
    #[error("cassette version {found} not supported (expected {expected})")]
    UnsupportedVersion {
        /// Version value found in the file.
        found: serde_json::Value,
        /// Version this engine supports.
        expected: u32,
    },

    /// A payload could not be canonicalized or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A record/play session was requested while another one is running.
    #[error("a cassette session is already active ({active:?})")]
    SessionAlreadyActive {
        /// Name of the cassette owned by the running session.
        active: String,
    },

    /// A cassette file exists but is not a well-formed cassette document.
    #[error("failed to parse cassette {}: {reason}", .path.display())]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The cassette name cannot be mapped to a file in the cassette directory.
    #[error("invalid cassette name {0:?}")]
    InvalidName(String),

    /// Store configuration could not be read or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem failure inside the cassette store.
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The wrapped client failed to produce a response.
    #[error("rpc call failed: {0}")]
    Upstream(#[source] BoxError),
}

impl Error {
    /// Wraps a failure reported by the underlying RPC client.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        Self::Upstream(err.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_keeps_source_message() {
        let err = Error::upstream("connection refused");
        assert_eq!(err.to_string(), "rpc call failed: connection refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn unsupported_version_names_both_versions() {
        let err = Error::UnsupportedVersion {
            found: json!(1),
            expected: 2,
        };
        assert_eq!(
            err.to_string(),
            "cassette version 1 not supported (expected 2)"
        );
    }
}
