//! Error types for apconf.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for apconf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Device session errors (connect, command execution)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Device output parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Operator console I/O errors
    #[error("Console error: {0}")]
    Console(#[from] io::Error),
}

/// Session layer errors (SSH connection, authentication, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Failed to open a PTY channel on the connection
    #[error("Failed to open PTY channel")]
    ChannelOpenFailed,

    /// Operation timed out waiting for the device prompt
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// The device rejected a command
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },
}

/// Errors scraping structured facts out of device command output.
#[derive(Error, Debug)]
pub enum ParseError {
    /// No `switchport access vlan` line in the interface's running config.
    ///
    /// The engine has no defined fallback VLAN, so the candidate cannot
    /// be reconfigured.
    #[error("No access VLAN found in running config of interface '{interface}'")]
    MissingVlan { interface: String },
}

/// Result type alias using apconf's Error.
pub type Result<T> = std::result::Result<T, Error>;
