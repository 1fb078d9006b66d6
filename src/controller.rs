//! Fleet controller.
//!
//! Sequences discovery, exclusion, and reconfiguration across the operator's
//! switch queue: one host at a time, one session at a time, with bounded
//! retry on connect. All phase state lives in the [`Controller`]; the
//! transition table is the exhaustive match in [`Controller::step`].

use std::collections::VecDeque;
use std::time::Duration;

use log::{error, info, warn};

use crate::console::Console;
use crate::discovery::{self, NeighborCandidate, TableSchema};
use crate::error::{Error, Result};
use crate::exclusion::{filter_exclusions, parse_exclusions};
use crate::reconfigure;
use crate::session::{Connect, Credentials, Session, SessionConfig};

/// How many consecutive failed connects to one host before it is skipped.
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Controller phase.
///
/// A session exists if and only if the state is `Discovering`,
/// `Reconfiguring`, or `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Reading the switch queue and credentials.
    AwaitingInput,
    /// Popping the next host off the queue.
    SelectingHost,
    /// Attempting to connect to the current host.
    Connecting,
    /// Running neighbor discovery and the exclusion filter.
    Discovering,
    /// Running the reconfiguration engine over the filtered candidates.
    Reconfiguring,
    /// Disconnecting from the current host.
    Closing,
    /// Queue exhausted; the run is over.
    Terminated,
}

/// The fleet state machine.
///
/// Owns the switch queue, the current session, and the retry counter.
/// Strictly sequential: every session operation and every prompt blocks the
/// controller until it returns.
pub struct Controller<C: Connect, U: Console> {
    connect: C,
    console: U,
    schema: TableSchema,
    port: u16,
    timeout: Duration,
    retry_limit: u32,

    state: ControllerState,
    queue: VecDeque<String>,
    credentials: Option<Credentials>,
    current_host: Option<String>,
    retries: u32,
    session: Option<C::Session>,
    retained: Vec<NeighborCandidate>,
}

impl<C: Connect, U: Console> Controller<C, U> {
    /// Create a controller with default port, timeout, retry limit, and
    /// table schema.
    pub fn new(connect: C, console: U) -> Self {
        Self {
            connect,
            console,
            schema: TableSchema::CISCO_IOS,
            port: 22,
            timeout: Duration::from_secs(30),
            retry_limit: DEFAULT_RETRY_LIMIT,
            state: ControllerState::AwaitingInput,
            queue: VecDeque::new(),
            credentials: None,
            current_host: None,
            retries: 0,
            session: None,
            retained: Vec::new(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connect timeout (default: 30s).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-host connect retry limit.
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Set the neighbor-table schema.
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Current controller phase.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Run the state machine to completion.
    ///
    /// Console errors are fatal, but any open session is still released
    /// before the error is returned.
    pub async fn run(&mut self) -> Result<()> {
        while self.state != ControllerState::Terminated {
            if let Err(e) = self.step().await {
                if let Some(session) = self.session.take() {
                    if let Err(close_err) = session.close().await {
                        warn!("disconnect failed: {close_err}");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Execute one transition.
    async fn step(&mut self) -> Result<()> {
        match self.state {
            ControllerState::AwaitingInput => self.await_input()?,
            ControllerState::SelectingHost => self.select_host(),
            ControllerState::Connecting => self.connect_current().await,
            ControllerState::Discovering => self.discover_current().await?,
            ControllerState::Reconfiguring => self.reconfigure_current().await,
            ControllerState::Closing => self.close_current().await,
            ControllerState::Terminated => {}
        }
        Ok(())
    }

    /// `AwaitingInput`: read the switch queue and credentials once.
    fn await_input(&mut self) -> Result<()> {
        let hosts = self.console.read_hosts()?;
        self.credentials = Some(self.console.read_credentials()?);
        self.queue = hosts.into();
        self.state = ControllerState::SelectingHost;
        Ok(())
    }

    /// `SelectingHost`: pop the next host, or terminate on an empty queue.
    fn select_host(&mut self) {
        match self.queue.pop_front() {
            Some(host) => {
                info!("next switch: {host}");
                self.retries = 0;
                self.current_host = Some(host);
                self.state = ControllerState::Connecting;
            }
            None => self.state = ControllerState::Terminated,
        }
    }

    /// `Connecting`: one connect attempt. Failure keeps the state at
    /// `Connecting` until the retry limit is reached, then abandons the
    /// host.
    async fn connect_current(&mut self) {
        let (Some(host), Some(credentials)) = (&self.current_host, &self.credentials) else {
            self.state = ControllerState::SelectingHost;
            return;
        };

        let config = SessionConfig {
            host: host.clone(),
            port: self.port,
            timeout: self.timeout,
        };

        match self.connect.connect(&config, credentials).await {
            Ok(session) => {
                self.retries = 0;
                self.session = Some(session);
                self.console.line(&format!("Connected to {host}."));
                self.state = ControllerState::Discovering;
            }
            Err(e) => {
                warn!("connect to {host} failed: {e}");
                self.console.line(&e.to_string());
                self.retries += 1;
                if self.retries >= self.retry_limit {
                    self.console.line(&format!("Could not connect to {host}."));
                    self.retries = 0;
                    self.current_host = None;
                    self.state = ControllerState::SelectingHost;
                }
            }
        }
    }

    /// `Discovering`: query the neighbor table, list candidates, apply the
    /// operator's exclusions. A discovery failure still reaches `Closing`.
    async fn discover_current(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            self.state = ControllerState::SelectingHost;
            return Ok(());
        };

        self.console.line("init.");

        match discovery::discover(session, &self.schema).await {
            Ok(candidates) => {
                self.console.line("Found:");
                for candidate in &candidates {
                    self.console.line(&candidate.to_string());
                }

                for (index, candidate) in candidates.iter().enumerate() {
                    self.console.line(&format!("{index}\t{candidate}"));
                }

                let input = self.console.read_exclusions()?;
                let excluded = parse_exclusions(&input);
                self.retained = filter_exclusions(candidates, &excluded);
                self.state = ControllerState::Reconfiguring;
            }
            Err(e) => {
                error!("neighbor discovery failed: {e}");
                self.state = ControllerState::Closing;
            }
        }
        Ok(())
    }

    /// `Reconfiguring`: run the engine over the retained candidates.
    ///
    /// A candidate without an access-VLAN line is skipped; any other
    /// session failure abandons the rest of this host's candidates. Either
    /// way the next state is `Closing`, so the session is never leaked.
    async fn reconfigure_current(&mut self) {
        let candidates = std::mem::take(&mut self.retained);
        let Some(session) = self.session.as_mut() else {
            self.state = ControllerState::SelectingHost;
            return;
        };

        for candidate in &candidates {
            self.console.line("Modifying:");
            self.console.line(&candidate.to_string());

            match reconfigure::reconfigure(session, candidate).await {
                Ok(_) => self.console.line("\tdone."),
                Err(Error::Parse(e)) => {
                    warn!("skipping {}: {e}", candidate.local_interface);
                }
                Err(e) => {
                    error!(
                        "reconfiguration of {} failed: {e}",
                        candidate.local_interface
                    );
                    break;
                }
            }
        }

        self.state = ControllerState::Closing;
    }

    /// `Closing`: disconnect and clear the current host.
    async fn close_current(&mut self) {
        self.console.line("end.");
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("disconnect failed: {e}");
            }
        }
        self.current_host = None;
        self.state = ControllerState::SelectingHost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::error::SessionError;

    #[derive(Default)]
    struct CallLog {
        connects: Vec<String>,
        commands: Vec<String>,
        batches: Vec<Vec<String>>,
        closes: usize,
    }

    struct ScriptedConsole {
        hosts: Vec<String>,
        exclusions: String,
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedConsole {
        fn new(hosts: &[&str], exclusions: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let lines = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    hosts: hosts.iter().map(|h| h.to_string()).collect(),
                    exclusions: exclusions.to_string(),
                    lines: lines.clone(),
                },
                lines,
            )
        }
    }

    impl Console for ScriptedConsole {
        fn read_hosts(&mut self) -> io::Result<Vec<String>> {
            Ok(self.hosts.clone())
        }

        fn read_credentials(&mut self) -> io::Result<Credentials> {
            Ok(Credentials::new("admin", "hunter2"))
        }

        fn read_exclusions(&mut self) -> io::Result<String> {
            Ok(self.exclusions.clone())
        }

        fn line(&mut self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
    }

    struct MockSession {
        responses: Arc<Mutex<VecDeque<String>>>,
        log: Arc<Mutex<CallLog>>,
        fail_config: bool,
    }

    impl Session for MockSession {
        async fn execute(&mut self, command: &str) -> Result<String> {
            self.log.lock().unwrap().commands.push(command.to_string());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn execute_config(&mut self, lines: &[String]) -> Result<String> {
            self.log.lock().unwrap().batches.push(lines.to_vec());
            if self.fail_config {
                return Err(SessionError::CommandFailed {
                    command: lines.first().cloned().unwrap_or_default(),
                    message: "% Invalid input".to_string(),
                }
                .into());
            }
            Ok(String::new())
        }

        async fn close(self) -> Result<()> {
            self.log.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    /// Scripted session factory: `outcomes` is consumed one entry per
    /// connect attempt (`false` = fail); once empty, attempts succeed.
    struct MockConnect {
        outcomes: Arc<Mutex<VecDeque<bool>>>,
        responses: Arc<Mutex<VecDeque<String>>>,
        log: Arc<Mutex<CallLog>>,
        fail_config: bool,
    }

    impl MockConnect {
        fn new(outcomes: &[bool], responses: &[&str]) -> (Self, Arc<Mutex<CallLog>>) {
            let log = Arc::new(Mutex::new(CallLog::default()));
            (
                Self {
                    outcomes: Arc::new(Mutex::new(outcomes.iter().copied().collect())),
                    responses: Arc::new(Mutex::new(
                        responses.iter().map(|r| r.to_string()).collect(),
                    )),
                    log: log.clone(),
                    fail_config: false,
                },
                log,
            )
        }
    }

    impl Connect for MockConnect {
        type Session = MockSession;

        async fn connect(
            &self,
            config: &SessionConfig,
            _credentials: &Credentials,
        ) -> Result<MockSession> {
            self.log.lock().unwrap().connects.push(config.host.clone());
            let ok = self.outcomes.lock().unwrap().pop_front().unwrap_or(true);
            if !ok {
                return Err(SessionError::AuthenticationFailed {
                    user: "admin".to_string(),
                }
                .into());
            }
            Ok(MockSession {
                responses: self.responses.clone(),
                log: self.log.clone(),
                fail_config: self.fail_config,
            })
        }
    }

    /// One fixed-width neighbor-table row with the capability code at the
    /// Cisco IOS offset.
    fn lldp_row(name: &str, intf: &str, capability: &str) -> String {
        format!("{name:<20}{intf:<15}{:<11}{capability}   Gi0", "120")
    }

    fn vlan_config(vlan: &str) -> String {
        format!("interface X\n switchport access vlan {vlan}\n switchport mode access\nend")
    }

    #[test]
    fn test_single_switch_scenario() {
        let lldp = lldp_row("AP-101", "Gi1/0/3", "W");
        let running = vlan_config("10");
        let (connect, log) = MockConnect::new(&[], &[&lldp, &running]);
        let (console, lines) = ScriptedConsole::new(&["10.0.0.1"], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        assert_eq!(controller.state(), ControllerState::Terminated);

        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec!["10.0.0.1"]);
        assert_eq!(log.closes, 1);
        assert_eq!(
            log.commands,
            vec![
                "show lldp neighbors",
                "show running-config interface Gi1/0/3",
            ]
        );
        assert_eq!(
            log.batches,
            vec![
                vec!["interface Gi1/0/3", "shutdown", "exit"],
                vec![
                    "default interface Gi1/0/3",
                    "interface Gi1/0/3",
                    "description AP-101",
                    "switchport access vlan 10",
                    "switchport mode access",
                    "no shutdown",
                    "exit",
                ],
            ]
        );

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&"Connected to 10.0.0.1.".to_string()));
        assert!(lines.contains(&"init.".to_string()));
        // "Found:" is followed by the plain candidate list, then the
        // indexed listing shown before the exclusion prompt.
        let found = lines.iter().position(|l| l == "Found:").unwrap();
        assert_eq!(lines[found + 1], "AP-101 (Gi1/0/3)");
        assert_eq!(lines[found + 2], "0\tAP-101 (Gi1/0/3)");
        assert!(lines.contains(&"Modifying:".to_string()));
        assert!(lines.contains(&"\tdone.".to_string()));
        assert!(lines.contains(&"end.".to_string()));
    }

    #[test]
    fn test_fleet_traversal_visits_hosts_in_order() {
        let (connect, log) = MockConnect::new(&[], &[]);
        let (console, _) = ScriptedConsole::new(&["sw1", "sw2", "sw3"], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        assert_eq!(controller.state(), ControllerState::Terminated);
        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec!["sw1", "sw2", "sw3"]);
        assert_eq!(log.closes, 3);
    }

    #[test]
    fn test_empty_host_list_terminates_without_connecting() {
        let (connect, log) = MockConnect::new(&[], &[]);
        let (console, _) = ScriptedConsole::new(&[], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        assert_eq!(controller.state(), ControllerState::Terminated);
        assert!(log.lock().unwrap().connects.is_empty());
    }

    #[test]
    fn test_retry_limit_skips_host() {
        // All five attempts against "bad" fail; "good" connects first try.
        let (connect, log) = MockConnect::new(&[false; 5], &[]);
        let (console, lines) = ScriptedConsole::new(&["bad", "good"], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec!["bad", "bad", "bad", "bad", "bad", "good"]);
        // No session was ever created for the skipped host.
        assert_eq!(log.closes, 1);
        assert!(
            lines
                .lock()
                .unwrap()
                .contains(&"Could not connect to bad.".to_string())
        );
    }

    #[test]
    fn test_connect_succeeds_before_retry_limit() {
        let (connect, log) = MockConnect::new(&[false, false, true], &[]);
        let (console, _) = ScriptedConsole::new(&["flaky"], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.connects.len(), 3);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_exclusions_drop_candidates() {
        let lldp = format!(
            "{}\n{}\n",
            lldp_row("AP-101", "Gi1/0/3", "W"),
            lldp_row("AP-102", "Gi1/0/7", "W"),
        );
        let running = vlan_config("20");
        let (connect, log) = MockConnect::new(&[], &[&lldp, &running]);
        let (console, _) = ScriptedConsole::new(&["sw1"], "0");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        let log = log.lock().unwrap();
        // Only the retained candidate's running config was queried.
        assert_eq!(
            log.commands,
            vec![
                "show lldp neighbors",
                "show running-config interface Gi1/0/7",
            ]
        );
        assert_eq!(log.batches.len(), 2);
        assert_eq!(log.batches[1][2], "description AP-102");
    }

    #[test]
    fn test_missing_vlan_skips_candidate_and_continues() {
        let lldp = format!(
            "{}\n{}\n",
            lldp_row("AP-101", "Gi1/0/3", "W"),
            lldp_row("AP-102", "Gi1/0/7", "W"),
        );
        let no_vlan = "interface X\n switchport mode trunk\nend";
        let running = vlan_config("30");
        let (connect, log) = MockConnect::new(&[], &[&lldp, no_vlan, &running]);
        let (console, lines) = ScriptedConsole::new(&["sw1"], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        let log = log.lock().unwrap();
        // Batches were only issued for the second candidate.
        assert_eq!(log.batches.len(), 2);
        assert_eq!(log.batches[0][0], "interface Gi1/0/7");
        assert_eq!(log.closes, 1);
        // One candidate completed.
        let lines = lines.lock().unwrap();
        assert_eq!(lines.iter().filter(|l| *l == "\tdone.").count(), 1);
    }

    #[test]
    fn test_engine_failure_still_closes_session() {
        let lldp = lldp_row("AP-101", "Gi1/0/3", "W");
        let running = vlan_config("10");
        let (mut connect, log) = MockConnect::new(&[], &[&lldp, &running]);
        connect.fail_config = true;
        let (console, lines) = ScriptedConsole::new(&["sw1", "sw2"], "");

        let mut controller = Controller::new(connect, console);
        tokio_test::block_on(controller.run()).unwrap();

        assert_eq!(controller.state(), ControllerState::Terminated);
        let log = log.lock().unwrap();
        // The session was closed despite the mid-engine failure, and the
        // run moved on to the next switch.
        assert_eq!(log.closes, 2);
        assert_eq!(log.connects, vec!["sw1", "sw2"]);
        assert!(lines.lock().unwrap().contains(&"end.".to_string()));
    }
}
