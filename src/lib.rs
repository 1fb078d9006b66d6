//! # apconf
//!
//! Fleet tool that rebuilds wireless-AP-facing switchports on Cisco IOS
//! switches over SSH.
//!
//! For every switch in an operator-supplied queue, apconf scrapes the LLDP
//! neighbor table for interfaces facing wireless-capable neighbors, lets the
//! operator exclude some of them, and then resets and reprograms each
//! remaining interface: description, access VLAN (carried over from the
//! current config), access mode, enable.
//!
//! The interesting parts live in three layers:
//!
//! - [`session`] — an SSH shell session with scrapli-style prompt scraping,
//!   behind a trait so the rest of the crate never touches the transport.
//! - [`discovery`] / [`reconfigure`] — the text scrapers that turn raw IOS
//!   command output into structured facts, with the fixed-width column
//!   layout isolated in [`discovery::TableSchema`].
//! - [`controller`] — the state machine sequencing
//!   discovery → filter → reconfigure → teardown across the fleet, one host
//!   and one session at a time, with bounded connect retry.

pub mod console;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod exclusion;
pub mod reconfigure;
pub mod session;

// Re-export main types for convenience
pub use console::{Console, StdConsole};
pub use controller::{Controller, ControllerState, DEFAULT_RETRY_LIMIT};
pub use discovery::{NeighborCandidate, TableSchema};
pub use error::{Error, ParseError, SessionError};
pub use reconfigure::ReconfigurationPlan;
pub use session::{Connect, Credentials, Session, SessionConfig, SshConnect, SshSession};
