//! Supervisor lifecycle against `/bin/sh` fake servers

#![cfg(unix)]

mod common;

use common::{shell_server, CommandRecorder, READY_SCRIPT};
use embedmongo::runtime::wire;
use embedmongo::{Command, Pid, SuperviseError, Supervisor, SupervisorState};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_ready_then_stop_escalates_to_kill() {
    let recorder = CommandRecorder::start().await;
    let mut supervisor = Supervisor::new(shell_server("ready", READY_SCRIPT, recorder.address));

    let process = supervisor.start().await.unwrap();
    let pid = process.pid();
    // `exec` keeps the shell's pid
    assert_eq!(pid.known(), process.os_pid());
    assert!(matches!(pid, Pid::Known(_)));
    assert!(process.startup_output().contains("waiting for connections"));
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert!(supervisor.check_alive());

    // the fake server ignores both shutdown commands, the kill ends it
    let code = supervisor.stop().await.unwrap();
    assert_eq!(code, None);
    assert_eq!(supervisor.state(), SupervisorState::Stopped(None));
    assert_eq!(
        recorder.payloads(),
        vec![wire::LEGACY_SHUTDOWN.to_vec(), wire::SHUTDOWN.to_vec()]
    );

    // stopping again is a no-op returning the same code
    assert_eq!(supervisor.stop().await.unwrap(), None);
    assert_eq!(recorder.payloads().len(), 2);
}

#[tokio::test]
async fn test_shutdown_flag_suppresses_commands() {
    let recorder = CommandRecorder::start().await;
    let mut supervisor = Supervisor::new(shell_server("flagged", READY_SCRIPT, recorder.address));

    let flag = supervisor.start().await.unwrap().shutdown_flag();
    assert!(flag.mark());

    supervisor.stop().await.unwrap();
    assert!(recorder.payloads().is_empty());
    assert!(matches!(supervisor.state(), SupervisorState::Stopped(_)));
}

#[tokio::test]
async fn test_failure_line_reports_captured_error() {
    let recorder = CommandRecorder::start().await;
    let script = r#"echo "2019-10-08 E STORAGE [initandlisten] Failed to set up listener: SocketException: Address already in use"
exec sleep 30"#;
    let mut supervisor = Supervisor::new(shell_server("in-use", script, recorder.address));

    let err = supervisor.start().await.err().unwrap();
    match err {
        SuperviseError::StartupFailed { message, .. } => {
            assert_eq!(message, "Address already in use")
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(supervisor.state(), SupervisorState::StartupFailed);
    assert!(supervisor.process().is_none());
    assert!(matches!(
        supervisor.stop().await,
        Err(SuperviseError::NotRunning(_))
    ));
}

#[tokio::test]
async fn test_silent_server_times_out_with_output() {
    let recorder = CommandRecorder::start().await;
    let mut config = shell_server("silent", "echo booting\nexec sleep 30", recorder.address);
    config.startup_timeout = Duration::from_millis(300);
    let mut supervisor = Supervisor::new(config);

    let err = supervisor.start().await.err().unwrap();
    match err {
        SuperviseError::StartupTimeout { output, timeout, .. } => {
            assert_eq!(output, "booting");
            assert_eq!(timeout, Duration::from_millis(300));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(supervisor.state(), SupervisorState::StartupFailed);
}

#[tokio::test]
async fn test_early_exit_does_not_wait_for_timeout() {
    let recorder = CommandRecorder::start().await;
    let mut config = shell_server("early-exit", "echo 'bad option'\nexit 2", recorder.address);
    config.startup_timeout = Duration::from_secs(30);
    let mut supervisor = Supervisor::new(config);

    let started = Instant::now();
    let err = supervisor.start().await.err().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        err,
        SuperviseError::StartupFailed { ref message, .. } if message == "bad option"
    ));
}

#[tokio::test]
async fn test_server_exiting_on_its_own_is_reaped() {
    let recorder = CommandRecorder::start().await;
    let script = "echo 'waiting for connections on port 27017'\nsleep 0.2\nexit 5";
    let mut supervisor = Supervisor::new(shell_server("self-exit", script, recorder.address));

    let process = supervisor.start().await.unwrap();
    assert_eq!(process.pid(), Pid::Unknown);

    let deadline = Instant::now() + Duration::from_secs(10);
    while supervisor.check_alive() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(supervisor.stop().await.unwrap(), Some(5));
    assert!(recorder.payloads().is_empty());
}

#[tokio::test]
async fn test_client_tool_is_ready_when_done() {
    let recorder = CommandRecorder::start().await;
    let mut config = shell_server("dump", "echo 'done dumping'\nexit 0", recorder.address);
    config.patterns = Command::MongoDump.startup_patterns();
    let mut supervisor = Supervisor::new(config);

    supervisor.start().await.unwrap();
    assert_eq!(supervisor.stop().await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let recorder = CommandRecorder::start().await;
    let mut supervisor = Supervisor::new(shell_server("twice", READY_SCRIPT, recorder.address));

    supervisor.start().await.unwrap();
    assert!(matches!(
        supervisor.start().await,
        Err(SuperviseError::AlreadyStarted(_))
    ));
    supervisor.stop().await.unwrap();
}
