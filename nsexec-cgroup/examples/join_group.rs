//! Add this process to an existing cgroup
//!
//! Run with: sudo cargo run --example join_group -- <name> [cgroup root]

use nsexec_cgroup::{CgroupJoiner, CgroupName};
use nsexec_core::ProcessId;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let mut args = std::env::args().skip(1);
    let name: CgroupName = args.next().ok_or("missing cgroup name")?.parse()?;

    let mut joiner = CgroupJoiner::new();
    if let Some(root) = args.next() {
        joiner = joiner.with_root(root);
    }

    let report = joiner.join(&name, ProcessId::current())?;
    for hierarchy in &report.accepted {
        println!("joined {name} in {hierarchy}");
    }
    for (hierarchy, e) in &report.rejected {
        println!("skipped {hierarchy}: {e}");
    }

    Ok(())
}
