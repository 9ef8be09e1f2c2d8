//! Tests for the `fzd` binary.

use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Run fzd with an isolated data directory
fn run_fzd(args: &[&str]) -> (String, String, bool) {
    let data_dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_fzd"))
        .args(args)
        .env("XDG_DATA_HOME", data_dir.path())
        .env_remove("FZD_LOG")
        .output()
        .expect("Failed to run fzd");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_match_ascending_by_default() {
    let (stdout, _, ok) = run_fzd(&["match", "ap", "apple", "grape", "banana"]);
    assert!(ok);
    assert_eq!(stdout, "list:36:grape\nlist:62:apple\n");
}

#[test]
fn test_match_reverse() {
    let (stdout, _, ok) = run_fzd(&["match", "--reverse", "ap", "apple", "grape"]);
    assert!(ok);
    assert_eq!(stdout, "list:62:apple\nlist:36:grape\n");
}

#[test]
fn test_match_nothing() {
    let (stdout, _, ok) = run_fzd(&["match", "xyz", "apple"]);
    assert!(ok);
    assert!(stdout.is_empty());
}

#[cfg(unix)]
#[test]
fn test_client_without_daemon_fails() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("none.sock");
    let (_, stderr, ok) = run_fzd(&["--socket", socket.to_str().unwrap(), "ping"]);
    assert!(!ok);
    assert!(stderr.contains("not running"));
}

/// A loopback address nothing is listening on
fn free_tcp_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

#[test]
fn test_stop_without_daemon() {
    let addr = free_tcp_addr();
    let (stdout, _, ok) = run_fzd(&["--tcp", &addr, "stop"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "Daemon is not running");
}

#[test]
fn test_serve_set_filter_stop() {
    let addr = free_tcp_addr();
    let data_dir = tempfile::tempdir().unwrap();
    let mut daemon = Command::new(env!("CARGO_BIN_EXE_fzd"))
        .args(["--tcp", &addr, "serve"])
        .env("XDG_DATA_HOME", data_dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start fzd serve");

    // Wait for the listener to come up
    let mut up = false;
    for _ in 0..100 {
        if run_fzd(&["--tcp", &addr, "ping"]).2 {
            up = true;
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    if !up {
        let _ = daemon.kill();
        panic!("fzd serve did not start on {}", addr);
    }

    let (stdout, _, ok) = run_fzd(&["--tcp", &addr, "set-list", "apple", "banana"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "2");

    let (stdout, _, ok) = run_fzd(&["--tcp", &addr, "set-command-list", "grape"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "1");

    let (stdout, _, ok) = run_fzd(&["--tcp", &addr, "filter", "ap"]);
    assert!(ok);
    assert_eq!(stdout, "command:36:grape\nlist:62:apple\n");

    let (stdout, _, ok) = run_fzd(&["--tcp", &addr, "stop"]);
    assert!(ok);
    assert_eq!(stdout.trim(), "Daemon stopped");

    let status = daemon.wait().unwrap();
    assert!(status.success());
}
