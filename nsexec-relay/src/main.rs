//! nsexec-relay - start a child and print the PID it reports

use anyhow::{Context, Result};
use clap::Parser;
use nsexec_core::ProcessId;
use nsexec_relay::{RelayMode, ReportPipe, read_report};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::process::Command;
use tracing::{Level, debug, info, warn};

#[derive(Parser)]
#[command(name = "nsexec-relay")]
#[command(about = "Start a command and relay the PID it reports", long_about = None)]
#[command(version)]
struct Cli {
    /// Run the command under the launcher in fresh namespaces
    #[arg(long)]
    wrap: bool,

    /// Launcher used with --wrap
    #[arg(long, value_name = "PATH", default_value = "nsexec")]
    launcher: PathBuf,

    /// Seconds to wait for the report
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    timeout: u64,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Command to run
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

#[derive(Serialize)]
struct Relayed<'a> {
    pid: ProcessId,
    command: &'a [String],
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the relayed PID
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mode = if cli.wrap {
        RelayMode::Wrap {
            launcher: cli.launcher.clone(),
        }
    } else {
        RelayMode::Direct
    };

    let pipe = ReportPipe::new().context("Failed to create report pipe")?;
    let argv = mode.argv(pipe.writer_fd(), &cli.command);
    let Some((program, args)) = argv.split_first() else {
        anyhow::bail!("Command cannot be empty");
    };

    debug!(argv = ?argv, "Spawning child");
    // Killed if we bail out before the report arrives
    let mut child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {}", program.to_string_lossy()))?;

    let mut reader = pipe.into_reader().context("Failed to open report pipe")?;
    let report = read_report(&mut reader, Duration::from_secs(cli.timeout))
        .await
        .context("No PID received")?;

    info!(pid = %report.pid(), "Child reported PID");
    if cli.json {
        let relayed = Relayed {
            pid: report.pid(),
            command: &cli.command,
        };
        println!("{}", serde_json::to_string(&relayed)?);
    } else {
        println!("{}", report.pid());
    }

    match child.wait().await {
        Ok(status) => debug!(%status, "Child exited"),
        Err(e) => warn!(error = %e, "Wait for child failed"),
    }

    Ok(())
}
