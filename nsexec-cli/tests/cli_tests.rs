use assert_cmd::Command;
use predicates::prelude::*;
use std::os::unix::process::CommandExt;
use std::process::Stdio;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

fn nsexec() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nsexec"))
}

/// Split launcher stdout into the reported PID and whatever followed it
fn split_report(stdout: &[u8]) -> (i32, String) {
    assert_eq!(stdout.first(), Some(&0x01), "missing sentinel: {stdout:?}");
    let text = String::from_utf8_lossy(&stdout[1..]).into_owned();
    let (pid, rest) = text.split_once('\n').expect("unterminated report");
    (pid.parse().expect("non-numeric PID"), rest.to_string())
}

#[test]
fn test_no_command_prints_usage() {
    nsexec()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_no_command_has_no_side_effects() {
    // -p would report a PID; without a command nothing is written but usage
    nsexec()
        .arg("-p")
        .assert()
        .success()
        .stdout(predicate::str::contains("\u{1}").not());
}

#[test]
fn test_help_flag() {
    nsexec()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("-a <PID>"));
}

#[test]
fn test_version_flag() {
    nsexec()
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("nsexec"));
}

#[test]
fn test_unknown_command_fails() {
    nsexec()
        .arg("nsexec-no-such-command")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nsexec-no-such-command"));
}

#[test]
fn test_invalid_cgroup_name_rejected() {
    nsexec()
        .args(["-g", "bad.name", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid path"));
}

#[test]
fn test_absolute_cgroup_name_rejected() {
    nsexec()
        .args(["-g", "/sys/fs/cgroup", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid path"));
}

#[test]
fn test_invalid_rtprio_rejected() {
    nsexec().args(["-r", "0", "true"]).assert().code(1);
}

#[test]
fn test_attach_conflicts_with_new_namespaces() {
    nsexec()
        .args(["-a", "1", "-n", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_runs_command_without_namespaces() {
    nsexec()
        .args(["echo", "-n", "hello"])
        .assert()
        .success()
        .stdout("hello");
}

#[test]
fn test_report_pid_matches_command() {
    let output = nsexec()
        .args(["-p", "sh", "-c", "echo $$"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let (pid, rest) = split_report(&output.stdout);
    assert_eq!(rest.trim(), pid.to_string());
}

#[test]
fn test_report_to_stdin_rejected() {
    nsexec()
        .args(["-w", "0", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot carry"));
}

#[test]
fn test_report_to_closed_descriptor_rejected() {
    nsexec()
        .args(["-w", "987", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not open"));
}

#[test]
fn test_close_fds_keeps_stdio() {
    let output = nsexec()
        .args(["-c", "-p", "sh", "-c", "echo $$"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let (pid, rest) = split_report(&output.stdout);
    assert_eq!(rest.trim(), pid.to_string());
}

#[test]
fn test_attach_to_own_namespaces_is_noop() {
    let me = std::process::id().to_string();
    let output = nsexec()
        .args(["-a", &me, "-p", "sh", "-c", "echo $$"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let (pid, rest) = split_report(&output.stdout);
    assert_eq!(rest.trim(), pid.to_string());
}

#[test]
fn test_detach_without_group_leadership_does_not_fork() {
    let child = std::process::Command::new(env!("CARGO_BIN_EXE_nsexec"))
        .args(["-d", "-p", "sh", "-c", "echo $$"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let launcher = i32::try_from(child.id()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let (pid, rest) = split_report(&output.stdout);
    assert_eq!(pid, launcher);
    assert_eq!(rest.trim(), pid.to_string());
}

#[test]
fn test_detach_as_group_leader_forks() {
    let child = std::process::Command::new(env!("CARGO_BIN_EXE_nsexec"))
        .args(["-d", "-p", "sh", "-c", "echo $$"])
        .process_group(0)
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let launcher = i32::try_from(child.id()).unwrap();
    // reads to EOF, so the detached child's output is included
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let (pid, rest) = split_report(&output.stdout);
    assert_ne!(pid, launcher);
    assert_eq!(rest.trim(), pid.to_string());
}

#[test]
fn test_unprivileged_namespace_creation_fails() {
    // Skip if running as root
    if is_root() {
        return;
    }

    nsexec()
        .args(["-u", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
#[ignore] // Requires root
fn test_pid_namespace_exits_zero_after_child() {
    let output = nsexec()
        .args(["-P", "-p", "sh", "-c", "echo $$; exit 3"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let (pid, rest) = split_report(&output.stdout);
    assert!(pid > 1);
    // init of the new namespace
    assert_eq!(rest.trim(), "1");
}

#[test]
#[ignore] // Requires root
fn test_new_uts_namespace_isolates_hostname() {
    nsexec()
        .args(["-u", "sh", "-c", "hostname nsexec-test && hostname"])
        .assert()
        .success()
        .stdout("nsexec-test\n");
}

#[test]
#[ignore] // Requires root
fn test_new_network_namespace_has_only_loopback() {
    nsexec()
        .args(["-n", "ls", "/sys/class/net"])
        .assert()
        .success()
        .stdout("lo\n");
}
