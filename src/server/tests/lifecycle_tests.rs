//! Process lifecycle tests
//!
//! A shell script stands in for `mongod`: it ignores its arguments and
//! sleeps, while the test itself opens (or withholds) the listening socket
//! so readiness is under test control.

#![cfg(unix)]

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use rbacprobe_core::{ServerSection, StartupError};
use rbacprobe_server::{ServerLauncher, ServerState};
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::sleep;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Write an executable `/bin/sh` script standing in for the server binary
fn fake_server(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-mongod");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("No local addr").port()
}

fn config(binary: PathBuf, port: u16) -> ServerSection {
    ServerSection {
        binary,
        host: "127.0.0.1".to_string(),
        port,
        startup_timeout_ms: 5_000,
        shutdown_grace_ms: 2_000,
        probe_interval_ms: 50,
        expected_version: None,
        ..ServerSection::default()
    }
}

/// Accept connections on `port` after `delay`, standing in for the server socket
fn listen_after(port: u16, delay: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind test listener");
        loop {
            if listener.accept().await.is_err() {
                break;
            }
        }
    })
}

#[tokio::test]
#[serial]
async fn test_start_waits_for_readiness_and_release_is_idempotent() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let binary = fake_server(&scripts, "exec sleep 30");
    let port = free_port();

    let listener = listen_after(port, Duration::from_millis(300));
    let launcher = ServerLauncher::new(config(binary, port));

    let mut server = launcher.start().await.expect("Server should become ready");
    assert_eq!(server.state(), ServerState::Ready);
    assert_eq!(server.port(), port);
    assert_eq!(server.host(), "127.0.0.1");
    assert!(server.pid().is_some());

    let data_dir = server.data_dir().expect("Data dir while running").to_path_buf();
    assert!(data_dir.exists());

    server.release().await.expect("First release should succeed");
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(!data_dir.exists(), "Data dir should be removed on release");
    assert!(server.pid().is_none());

    server.release().await.expect("Second release should be a no-op");
    assert_eq!(server.state(), ServerState::Stopped);

    listener.abort();
}

#[tokio::test]
#[serial]
async fn test_early_exit_reports_output() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let binary = fake_server(
        &scripts,
        "echo 'Unable to lock file: /data/db/mongod.lock' >&2\nexit 100",
    );

    let launcher = ServerLauncher::new(config(binary, free_port()));

    match launcher.start().await {
        Err(StartupError::ExitedEarly { status, output }) => {
            assert!(status.contains("100"), "status was {}", status);
            assert!(output.contains("Unable to lock file"), "output was {}", output);
        }
        other => panic!("Expected ExitedEarly, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_readiness_timeout() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let binary = fake_server(&scripts, "exec sleep 30");

    let mut section = config(binary, free_port());
    section.startup_timeout_ms = 400;
    let launcher = ServerLauncher::new(section);

    match launcher.start().await {
        Err(StartupError::ReadinessTimeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(400));
        }
        other => panic!("Expected ReadinessTimeout, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_port_in_use_is_refused() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let binary = fake_server(&scripts, "exec sleep 30");

    let occupied = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
    let port = occupied.local_addr().expect("No local addr").port();

    let launcher = ServerLauncher::new(config(binary, port));

    match launcher.start().await {
        Err(StartupError::PortInUse { port: refused, .. }) => assert_eq!(refused, port),
        other => panic!("Expected PortInUse, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_missing_binary_fails_to_spawn() {
    init_tracing();
    let launcher = ServerLauncher::new(config(
        PathBuf::from("/nonexistent/rbacprobe/mongod"),
        free_port(),
    ));

    assert!(matches!(
        launcher.start().await,
        Err(StartupError::Spawn { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_version_check() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let binary = fake_server(
        &scripts,
        "if [ \"$1\" = \"--version\" ]; then echo 'db version v4.4.29'; exit 0; fi\nexec sleep 30",
    );

    let launcher = ServerLauncher::new(config(binary.clone(), free_port()));
    assert_eq!(launcher.check_version("4.4").await.unwrap(), "4.4.29");

    let mut section = config(binary, free_port());
    section.expected_version = Some("6.0".to_string());
    match ServerLauncher::new(section).start().await {
        Err(StartupError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, "6.0");
            assert_eq!(found, "4.4.29");
        }
        other => panic!("Expected VersionMismatch, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_hanging_version_check_is_bounded() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let binary = fake_server(&scripts, "exec sleep 5");

    let mut section = config(binary, free_port());
    section.expected_version = Some("4.4".to_string());
    section.startup_timeout_ms = 400;
    let launcher = ServerLauncher::new(section);

    let started = Instant::now();
    let result = launcher.start().await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(StartupError::VersionCheck(_))),
        "Expected VersionCheck, got {:?}",
        result
    );
    assert!(
        elapsed < Duration::from_secs(2),
        "start took {:?} with a 400ms startup timeout",
        elapsed
    );
}

#[tokio::test]
#[serial]
async fn test_drop_without_release_kills_process() {
    init_tracing();
    let scripts = TempDir::new().expect("Failed to create temp dir");
    let pid_file = scripts.path().join("pid");
    let binary = fake_server(
        &scripts,
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let port = free_port();

    let listener = listen_after(port, Duration::from_millis(100));
    let server = ServerLauncher::new(config(binary, port))
        .start()
        .await
        .expect("Server should become ready");
    let data_dir = server.data_dir().expect("Data dir while running").to_path_buf();
    let pid = server.pid().expect("Server should have a pid");

    let recorded = std::fs::read_to_string(&pid_file).expect("Script should record its pid");
    assert_eq!(recorded.trim(), pid.to_string());

    drop(server);
    assert!(!data_dir.exists(), "TempDir drop should remove the data dir");

    // SIGKILL is delivered asynchronously; the runtime reaps the child
    let pid = Pid::from_raw(pid as i32);
    let mut gone = false;
    for _ in 0..40 {
        if kill(pid, None) == Err(Errno::ESRCH) {
            gone = true;
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert!(gone, "Process {} still running after drop", pid);

    listener.abort();
}
