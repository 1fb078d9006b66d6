//! Operator console boundary.
//!
//! The fleet controller never touches stdin/stdout directly; it drives a
//! [`Console`] so the state machine can be exercised in tests with canned
//! input sequences.

use std::io::{self, BufRead, Write};

use crate::session::Credentials;

/// Prompt printed before the exclusion index list is read.
pub const EXCLUSION_PROMPT: &str =
    "Enter the list numbers you'd like to exclude, separated by spaces.";

/// Interactive surface of one run.
pub trait Console {
    /// Prompt for the switch queue: one hostname/IP per line, terminated by
    /// a blank line.
    fn read_hosts(&mut self) -> io::Result<Vec<String>>;

    /// Prompt for the fleet credentials. The password must not be echoed.
    fn read_credentials(&mut self) -> io::Result<Credentials>;

    /// Prompt for the whitespace-separated exclusion index list.
    fn read_exclusions(&mut self) -> io::Result<String>;

    /// Print one status line.
    fn line(&mut self, text: &str);
}

/// Console over stdin/stdout.
pub struct StdConsole;

impl StdConsole {
    /// Create a stdin/stdout console.
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn read_hosts(&mut self) -> io::Result<Vec<String>> {
        println!("Switches:");
        let mut hosts = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                break;
            }
            hosts.push(line);
        }
        Ok(hosts)
    }

    fn read_credentials(&mut self) -> io::Result<Credentials> {
        println!("Username:");
        let username = self.read_line()?;
        let secret = rpassword::prompt_password("Password:\n")?;
        Ok(Credentials::new(username, secret))
    }

    fn read_exclusions(&mut self) -> io::Result<String> {
        println!("{EXCLUSION_PROMPT}");
        self.read_line()
    }

    fn line(&mut self, text: &str) {
        println!("{text}");
        let _ = io::stdout().flush();
    }
}
