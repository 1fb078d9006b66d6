//! Device session layer.
//!
//! A [`Session`] is a live authenticated command channel to one switch,
//! supporting read-only commands and configuration-mode batches. The
//! controller only ever talks to the trait, so tests can inject scripted
//! sessions; [`SshConnect`] provides the real SSH-backed implementation.

mod buffer;
pub mod ssh;

pub use buffer::PatternBuffer;
pub use ssh::{SshConnect, SshSession};

use std::future::Future;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::Result;

/// Login credentials, captured once per run and shared read-only by all
/// sessions. The secret is wrapped so it never shows up in debug output.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username for authentication.
    pub username: String,

    /// Password, redacted in `Debug`.
    pub secret: SecretString,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

/// Per-host connection parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Connection timeout, also used as the prompt-read timeout.
    pub timeout: Duration,
}

impl SessionConfig {
    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// An authenticated command channel to one device.
///
/// At most one session is live at any time; the controller owns it for its
/// whole lifetime and closes it before moving to the next host.
pub trait Session: Send {
    /// Run a single read-only command and return its full textual output
    /// (may be empty).
    fn execute(&mut self, command: &str) -> impl Future<Output = Result<String>> + Send;

    /// Enter configuration mode, apply the lines in order, exit
    /// configuration mode, and return the combined output.
    ///
    /// Best-effort from the caller's perspective: there is no partial
    /// application contract and no rollback.
    fn execute_config(&mut self, lines: &[String]) -> impl Future<Output = Result<String>> + Send;

    /// Release the channel.
    ///
    /// Consumes the session — it cannot be used after this.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Session factory. The controller retries `connect` with a bounded retry
/// counter before giving up on a host.
pub trait Connect: Send + Sync {
    /// The session type produced on a successful connect.
    type Session: Session;

    /// Open an authenticated session to the host described by `config`.
    fn connect(
        &self,
        config: &SessionConfig,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Session>> + Send;
}
