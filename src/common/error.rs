//! Error types for the Delve remote client
//!
//! RPC-level errors are never swallowed by the session controller; they are
//! propagated to the caller, which owns user-visible reporting.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Delve remote client
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("No debug session active. Use 'dlvctl debug' or 'dlvctl connect <addr>' first")]
    SessionNotActive,

    #[error("Debug session already connected. Stop it first")]
    SessionAlreadyActive,

    // === Protocol Errors ===
    /// The server answered with an error field; the message is kept verbatim
    #[error("{0}")]
    Protocol(String),

    // === Breakpoint Errors ===
    #[error("No breakpoint at {location}")]
    BreakpointNotFound { location: String },

    #[error("Invalid breakpoint location: {0}")]
    InvalidLocation(String),

    // === Execution Errors ===
    #[error("There is no current thread. Halt at a breakpoint first")]
    NoCurrentThread,

    // === Debugger Process Errors ===
    #[error("Delve executable 'dlv' not found. Install it or set [dlv] path in the config file")]
    DebuggerNotFound,

    #[error("Failed to start delve: {0}")]
    DebuggerStartFailed(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid env file '{path}': {message}")]
    EnvFile { path: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Usage Errors ===
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Create a breakpoint not found error for a `file:line` location
    pub fn breakpoint_not_found(location: impl std::fmt::Display) -> Self {
        Self::BreakpointNotFound {
            location: location.to_string(),
        }
    }

    /// Create an env file error
    pub fn env_file(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::EnvFile {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Whether this error means the transport is gone
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_message_is_verbatim() {
        let err = Error::Protocol("Breakpoint exists at /tmp/main.go:10".to_string());
        assert_eq!(err.to_string(), "Breakpoint exists at /tmp/main.go:10");
    }

    #[test]
    fn test_io_errors_are_not_connection_errors() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(!err.is_connection());
        assert!(Error::Connection("closed".into()).is_connection());
    }
}
