//! Error types for the chat stream server.
//!
//! Only startup and listener plumbing can fail. Streaming itself is
//! infallible; a client going away is an early end, not an error.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Main error type for the server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Metrics error: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Config("bad origin".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad origin");

        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let err = ServerError::Bind {
            addr,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "Failed to bind 127.0.0.1:8000: in use");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ServerError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
