use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use apconf::console::StdConsole;
use apconf::controller::{Controller, DEFAULT_RETRY_LIMIT};
use apconf::session::SshConnect;

/// Rebuild wireless-AP-facing switchports across a fleet of Cisco IOS
/// switches.
#[derive(Parser, Debug)]
#[command(name = "apconf", version, about)]
struct Args {
    /// SSH port.
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// Connect timeout in seconds, also used for prompt reads.
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Consecutive failed connects to one host before it is skipped.
    #[arg(long, default_value_t = DEFAULT_RETRY_LIMIT)]
    retry_limit: u32,
}

// The run is strictly sequential (one switch, one session at a time), so a
// current-thread runtime is all it needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut controller = Controller::new(SshConnect, StdConsole::new())
        .with_port(args.port)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_retry_limit(args.retry_limit);

    match controller.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("apconf: {e}");
            ExitCode::FAILURE
        }
    }
}
