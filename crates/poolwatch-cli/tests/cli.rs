//! End-to-end tests for the `poolwatch` binary.
//!
//! These tests verify:
//! 1. Help output documents the environment variables
//! 2. Invalid configuration is fatal at startup
//! 3. Alerts raised from stdin input reach the log sink

use std::io::Write;
use std::process::{Command, Output, Stdio};

const CONFIG_VARS: [&str; 7] = [
    "SLACK_WEBHOOK_URL",
    "ERROR_RATE_THRESHOLD",
    "WINDOW_SIZE",
    "ALERT_COOLDOWN_SEC",
    "ACTIVE_POOL",
    "ERROR_RATE_CHECK_INTERVAL",
    "NGINX_LOG_FILE",
];

fn poolwatch(args: &[&str], envs: &[(&str, &str)], stdin: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_poolwatch"));
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "info")
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().unwrap();
    {
        let mut pipe = child.stdin.take().unwrap();
        // The process may exit before reading; a broken pipe is fine here.
        let _ = pipe.write_all(stdin.as_bytes());
    }
    child.wait_with_output().unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn line(pool: &str, status: u16) -> String {
    format!(
        "10.0.0.1 - - [01/Jan/2025:00:00:00 +0000] \"GET /health HTTP/1.1\" {status} 2 pool=\"{pool}\"\n"
    )
}

// ============================================================================
// Startup Tests
// ============================================================================

#[test]
fn test_help_lists_environment_variables() {
    let output = poolwatch(&["--help"], &[], "");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("ERROR_RATE_THRESHOLD"));
    assert!(stdout.contains("SLACK_WEBHOOK_URL"));
    assert!(stdout.contains("--stdin"));
}

#[test]
fn test_zero_window_is_rejected() {
    let output = poolwatch(&["--stdin", "--window-size", "0"], &[], "");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid configuration"));
}

#[test]
fn test_env_threshold_is_validated() {
    let output = poolwatch(&["--stdin"], &[("ERROR_RATE_THRESHOLD", "150")], "");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid configuration"));
}

// ============================================================================
// Alerting Tests
// ============================================================================

#[test]
fn test_stdin_failover_is_logged() {
    let input = [line("blue", 200), "not a log line\n".to_string(), line("green", 200)].concat();
    let output = poolwatch(&["--stdin"], &[], &input);
    let log = stderr(&output);

    assert!(output.status.success(), "stderr: {log}");
    assert!(log.contains("Failover detected: blue → green"));
    assert!(log.contains("watcher stopped"));
    assert!(log.contains("last alert"));
}

#[test]
fn test_stdin_error_rate_is_logged() {
    let input: String = [200, 500, 502, 200]
        .iter()
        .map(|status| line("blue", *status))
        .collect();
    let output = poolwatch(&["--stdin", "--window-size", "4", "--check-interval", "4"], &[], &input);
    let log = stderr(&output);

    assert!(output.status.success(), "stderr: {log}");
    assert!(log.contains("High error rate: 50.0% (threshold: 2.0%)"));
    assert!(!log.contains("Failover detected"));
}
