//! nsexec - run a command in new or existing Linux namespaces
//!
//! The process forks by hand, so there is no async runtime here.

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;
mod fds;
mod launch;
mod plan;

use cli::Cli;

/// Environment variable holding the log filter
const LOG_ENV: &str = "NSEXEC_LOG";

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help goes to stdout and succeeds; every parse error exits 1
            let code = i32::from(e.use_stderr());
            // nothing left to report a broken stdout/stderr to
            e.print().ok();
            process::exit(code);
        }
    };

    if cli.version {
        println!("nsexec {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // stdout may carry the PID report
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = launch::execute(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
