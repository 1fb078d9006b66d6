//! SSH-backed device session using russh.
//!
//! Opens a PTY + shell on the device and scrapes the Cisco IOS CLI by
//! reading until a prompt pattern matches, scrapli-style. Only password
//! authentication is supported; the fleet credentials are captured once
//! at the start of a run.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::ExposeSecret;

use super::buffer::PatternBuffer;
use super::{Connect, Credentials, Session, SessionConfig};
use crate::error::{Result, SessionError};

/// Combined prompt pattern for the IOS CLI: user exec (`>`), privileged
/// exec (`#`), and configuration mode (`(config…)#`). Adapted from
/// scrapli's IOS-XE patterns.
const PROMPT_PATTERN: &str = r"(?m)^[\w.\-@()/:]{1,63}[>#]\s?$";

/// Output markers that indicate the device rejected a command.
const FAILURE_MARKERS: &[&str] = &[
    "% Ambiguous command",
    "% Incomplete command",
    "% Invalid input",
    "% Error",
];

/// Paging would stall the prompt read, so it is disabled right after the
/// shell comes up.
const ON_OPEN_COMMAND: &str = "terminal length 0";

/// Terminal width for the PTY.
const TERMINAL_WIDTH: u32 = 511;

/// Terminal height for the PTY.
const TERMINAL_HEIGHT: u32 = 24;

/// How many bytes from the end of the output to search for prompts.
const PROMPT_SEARCH_DEPTH: usize = 1000;

/// Compile the combined prompt pattern.
fn prompt_pattern() -> Regex {
    Regex::new(PROMPT_PATTERN).unwrap_or_else(|_| Regex::new(r"[>#]\s?$").unwrap())
}

/// Session factory producing [`SshSession`]s.
pub struct SshConnect;

impl Connect for SshConnect {
    type Session = SshSession;

    async fn connect(
        &self,
        config: &SessionConfig,
        credentials: &Credentials,
    ) -> Result<SshSession> {
        SshSession::connect(config, credentials).await
    }
}

/// An authenticated SSH shell session to one switch.
pub struct SshSession {
    /// The russh session handle.
    handle: Handle<SshHandler>,

    /// PTY channel running the device shell.
    channel: Channel<Msg>,

    /// Accumulated output since the last prompt.
    buffer: PatternBuffer,

    /// Prompt pattern matched at the end of every command.
    prompt: Regex,

    /// Timeout for prompt reads.
    timeout: Duration,
}

impl SshSession {
    /// Connect to the device, authenticate, and bring up a shell ready
    /// for command scraping.
    pub async fn connect(config: &SessionConfig, credentials: &Credentials) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        debug!("connecting to {}", config.socket_addr());

        let mut handle = tokio::time::timeout(
            config.timeout,
            client::connect(
                ssh_config,
                (config.host.as_str(), config.port),
                SshHandler,
            ),
        )
        .await
        .map_err(|_| SessionError::Timeout(config.timeout))?
        .map_err(|e| match e {
            russh::Error::IO(source) => SessionError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port,
                source,
            },
            other => SessionError::Ssh(other),
        })?;

        let authenticated = handle
            .authenticate_password(&credentials.username, credentials.secret.expose_secret())
            .await
            .map_err(SessionError::Ssh)?
            .success();

        if !authenticated {
            return Err(SessionError::AuthenticationFailed {
                user: credentials.username.clone(),
            }
            .into());
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(SessionError::Ssh)?;

        channel
            .request_pty(true, "xterm", TERMINAL_WIDTH, TERMINAL_HEIGHT, 0, 0, &[])
            .await
            .map_err(|_| SessionError::ChannelOpenFailed)?;

        channel
            .request_shell(true)
            .await
            .map_err(|_| SessionError::ChannelOpenFailed)?;

        let mut session = Self {
            handle,
            channel,
            buffer: PatternBuffer::new(PROMPT_SEARCH_DEPTH),
            prompt: prompt_pattern(),
            timeout: config.timeout,
        };

        // Swallow the login banner up to the first prompt, then disable
        // paging so long outputs arrive in one piece.
        session.read_until_prompt().await?;
        session.run(ON_OPEN_COMMAND).await?;

        debug!("session to {} ready", config.host);
        Ok(session)
    }

    /// Send one line to the device shell.
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(line.len() + 1);
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
        self.channel
            .data(&payload[..])
            .await
            .map_err(SessionError::Ssh)?;
        Ok(())
    }

    /// Accumulate channel output until the prompt pattern matches in the
    /// buffer tail, then return everything read.
    async fn read_until_prompt(&mut self) -> Result<String> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if self.buffer.tail_contains(&self.prompt) {
                let data = self.buffer.take();
                return Ok(String::from_utf8_lossy(&data).into_owned());
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| SessionError::Timeout(self.timeout))?
                .ok_or(SessionError::Disconnected)?;

            match msg {
                ChannelMsg::Data { data } => self.buffer.extend(&data),
                ChannelMsg::ExtendedData { data, .. } => self.buffer.extend(&data),
                ChannelMsg::Eof | ChannelMsg::Close => {
                    return Err(SessionError::Disconnected.into());
                }
                _ => {}
            }
        }
    }

    /// Send a command and scrape its normalized output.
    async fn run(&mut self, command: &str) -> Result<String> {
        trace!("sending: {command}");
        self.buffer.clear();
        self.send_line(command).await?;
        let raw = self.read_until_prompt().await?;
        Ok(normalize_output(&raw, command, &self.prompt))
    }

    /// Like [`run`](Self::run), but fails if the device rejected the
    /// command.
    async fn run_checked(&mut self, command: &str) -> Result<String> {
        let output = self.run(command).await?;
        if let Some(marker) = detect_failure(&output) {
            return Err(SessionError::CommandFailed {
                command: command.to_string(),
                message: marker.to_string(),
            }
            .into());
        }
        Ok(output)
    }
}

impl Session for SshSession {
    async fn execute(&mut self, command: &str) -> Result<String> {
        self.run_checked(command).await
    }

    async fn execute_config(&mut self, lines: &[String]) -> Result<String> {
        let mut combined = String::new();
        for command in config_mode_script(lines) {
            let output = self.run_checked(&command).await?;
            combined.push_str(&output);
        }
        Ok(combined)
    }

    async fn close(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(SessionError::Ssh)?;
        Ok(())
    }
}

/// Expand a config batch into the full command script: enter configuration
/// mode, apply the lines in order, exit.
fn config_mode_script(lines: &[String]) -> Vec<String> {
    let mut script = Vec::with_capacity(lines.len() + 2);
    script.push("configure terminal".to_string());
    script.extend(lines.iter().cloned());
    script.push("end".to_string());
    script
}

/// Strip the command echo and the trailing prompt from raw PTY output.
///
/// The last line is only dropped when it actually matches the prompt
/// pattern, so a command with no output normalizes to an empty string.
fn normalize_output(raw: &str, command: &str, prompt: &Regex) -> String {
    let output = raw
        .strip_prefix(command)
        .unwrap_or(raw)
        .trim_start_matches(['\r', '\n']);

    let tail_start = output.rfind('\n').map_or(0, |pos| pos + 1);
    if prompt.is_match(output[tail_start..].as_bytes()) {
        output[..tail_start].trim_end_matches('\n').to_string()
    } else {
        output.to_string()
    }
}

/// Check device output for a rejection marker.
fn detect_failure(output: &str) -> Option<&'static str> {
    FAILURE_MARKERS
        .iter()
        .find(|marker| output.contains(**marker))
        .copied()
}

/// SSH client handler.
///
/// Host keys are accepted unconditionally: the tool targets lab and campus
/// switch fleets where a curated known_hosts file rarely exists, and the
/// run is already gated on interactive credentials.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
