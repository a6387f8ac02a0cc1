//! Compare another process's namespaces with ours, without joining them
//!
//! Run with: cargo run --example inspect_namespaces -- <pid>

use nsexec_core::ProcessId;
use nsexec_namespace::{HostBackend, NamespaceBackend, NamespaceKind};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let pid = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => ProcessId::current(),
    };
    let backend = HostBackend;

    println!("Namespaces of {pid}:");
    for kind in NamespaceKind::ALL {
        let name = kind.proc_name();
        let theirs = backend.identity(&PathBuf::from(format!("/proc/{pid}/ns/{name}")));
        let ours = backend.identity(&PathBuf::from(format!("/proc/self/ns/{name}")));

        match (theirs, ours) {
            (Ok(theirs), Ok(ours)) => {
                let state = if theirs == ours { "shared" } else { "differs" };
                println!("  {kind}: inode {} ({state})", theirs.ino);
            }
            (Err(e), _) | (_, Err(e)) => println!("  {kind}: unreadable ({e})"),
        }
    }

    Ok(())
}
