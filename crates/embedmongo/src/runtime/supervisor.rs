//! Supervised server process: startup classification and escalating stop

use crate::runtime::classifier::{
    OutputClassifier, OutputStream, Pid, StartupOutcome, StartupPatterns,
};
use crate::runtime::shutdown::{
    self, CommandChannel, ProcessControl, ShutdownFlag, ShutdownPlan, TcpCommandChannel,
};
use crate::runtime::signal::{self, OsSignal};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long a reader task may keep draining after its process is gone
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing spawned yet
    NotStarted,
    /// Spawned, waiting for the readiness line
    Starting,
    /// Startup failed or timed out; terminal
    StartupFailed,
    /// Ready and handed to the caller
    Running,
    /// Shutdown escalation in progress
    Stopping,
    /// Reaped with exit code; terminal
    Stopped(Option<i32>),
}

impl SupervisorState {
    /// Check if the process is up and accepting connections
    pub fn is_running(&self) -> bool {
        matches!(self, SupervisorState::Running)
    }

    /// True once no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SupervisorState::StartupFailed | SupervisorState::Stopped(_)
        )
    }
}

/// Everything needed to spawn and later stop one server process
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Name used as log prefix
    pub name: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Address the server listens on, target of the shutdown commands
    pub address: SocketAddr,
    pub patterns: StartupPatterns,
    pub startup_timeout: Duration,
    /// Bounded wait after each shutdown step
    pub shutdown_step_timeout: Duration,
}

impl SupervisorConfig {
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<PathBuf>,
        address: SocketAddr,
    ) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            address,
            patterns: StartupPatterns::new(),
            startup_timeout: Duration::from_secs(20),
            shutdown_step_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to a server that reported readiness
pub struct RunningProcess {
    child: Child,
    pid: Pid,
    startup_timeout: Duration,
    classifier: OutputClassifier,
    readers: Vec<JoinHandle<()>>,
    shutdown_flag: ShutdownFlag,
}

impl RunningProcess {
    /// PID printed by the server itself
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// PID of the spawned child as seen by the OS
    pub fn os_pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Startup wait the process was started with
    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// Output captured up to the readiness line
    pub fn startup_output(&self) -> String {
        self.classifier.output()
    }

    /// Mark this flag after sending a shutdown command through another client,
    /// so that stopping does not send a second one
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown_flag.clone()
    }
}

struct ChildControl<'a> {
    child: &'a mut Child,
}

impl ProcessControl for ChildControl<'_> {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn signal(&mut self, pid: u32, signal: OsSignal) -> io::Result<()> {
        signal::send_signal(pid, signal)
    }
}

/// Give reader tasks a moment to drain, then abort whatever is left
async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader)
            .await
            .is_err()
        {
            reader.abort();
        }
    }
}

/// Owns one server process from spawn to reap
pub struct Supervisor<C: CommandChannel = TcpCommandChannel> {
    config: SupervisorConfig,
    channel: C,
    state: SupervisorState,
    process: Option<RunningProcess>,
}

impl Supervisor {
    /// Create a supervisor using the TCP shutdown command channel
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_channel(config, TcpCommandChannel::default())
    }
}

impl<C: CommandChannel> Supervisor<C> {
    /// Supervisor sending shutdown commands through `channel`
    pub fn with_channel(config: SupervisorConfig, channel: C) -> Self {
        Self {
            config,
            channel,
            state: SupervisorState::NotStarted,
            process: None,
        }
    }

    /// Get the supervisor settings
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Get the running process, if started and not yet stopped
    pub fn process(&self) -> Option<&RunningProcess> {
        self.process.as_ref()
    }

    /// Spawn the server and wait until its output reports readiness.
    ///
    /// On failure or timeout the child is terminated and reaped before the
    /// error is returned.
    pub async fn start(&mut self) -> Result<&RunningProcess, SuperviseError> {
        if self.state != SupervisorState::NotStarted {
            return Err(SuperviseError::AlreadyStarted(self.config.name.clone()));
        }

        let name = self.config.name.clone();
        self.state = SupervisorState::Starting;
        log::info!(
            "[{}] Starting: {} {}",
            name,
            self.config.executable.display(),
            self.config.args.join(" ")
        );

        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.state = SupervisorState::StartupFailed;
                log::error!("[{}] Failed to spawn process: {}", name, e);
                return Err(SuperviseError::SpawnFailed { name, source: e });
            }
        };

        let classifier = OutputClassifier::new(self.config.patterns.clone());
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(classifier.attach(&name, stdout, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(classifier.attach(&name, stderr, OutputStream::Stderr));
        }

        let outcome = classifier.wait_for_result(self.config.startup_timeout).await;
        if outcome == StartupOutcome::Ready {
            let pid = classifier.pid();
            log::info!("[{}] Ready (pid {})", name, pid);
            self.state = SupervisorState::Running;
            return Ok(self.process.insert(RunningProcess {
                child,
                pid,
                startup_timeout: self.config.startup_timeout,
                classifier,
                readers,
                shutdown_flag: ShutdownFlag::new(),
            }));
        }

        self.abort_startup(&mut child, readers).await;
        self.state = SupervisorState::StartupFailed;

        let output = classifier.output();
        let err = match outcome {
            StartupOutcome::Failed(message) => SuperviseError::StartupFailed { name, message },
            StartupOutcome::Closed => SuperviseError::StartupFailed {
                name,
                message: if output.is_empty() {
                    "process exited before reporting readiness".to_string()
                } else {
                    output
                },
            },
            _ => SuperviseError::StartupTimeout {
                name,
                timeout: self.config.startup_timeout,
                output,
            },
        };
        log::error!("{}", err);
        Err(err)
    }

    async fn abort_startup(&self, child: &mut Child, readers: Vec<JoinHandle<()>>) {
        let name = &self.config.name;
        if let Some(pid) = child.id() {
            if let Err(e) = signal::send_signal(pid, OsSignal::Terminate) {
                log::debug!("[{}] Terminate after failed startup: {}", name, e);
            }
        }

        match tokio::time::timeout(self.config.shutdown_step_timeout, child.wait()).await {
            Ok(Ok(status)) => log::debug!("[{}] Exited with {} after failed startup", name, status),
            _ => {
                log::warn!("[{}] Process did not exit after failed startup, forcing kill", name);
                if let Err(e) = child.kill().await {
                    log::error!("[{}] Kill failed: {}", name, e);
                }
            }
        }

        drain_readers(readers).await;
    }

    /// Whether the running server is still alive
    pub fn check_alive(&mut self) -> bool {
        let name = &self.config.name;
        let Some(process) = self.process.as_mut() else {
            return false;
        };
        match process.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                log::warn!("[{}] Process exited unexpectedly: {}", name, status);
                false
            }
            Err(e) => {
                log::error!("[{}] Error checking process status: {}", name, e);
                false
            }
        }
    }

    /// Stop the server through the shutdown escalation and reap it.
    ///
    /// Stopping an already stopped supervisor returns the recorded exit code.
    pub async fn stop(&mut self) -> Result<Option<i32>, SuperviseError> {
        let name = self.config.name.clone();
        match self.state {
            SupervisorState::Stopped(code) => return Ok(code),
            SupervisorState::Running => {}
            _ => return Err(SuperviseError::NotRunning(name)),
        }
        let Some(mut process) = self.process.take() else {
            return Err(SuperviseError::NotRunning(name));
        };

        self.state = SupervisorState::Stopping;
        log::info!("[{}] Stopping process...", name);

        let plan = ShutdownPlan::new(
            self.config.address,
            process.pid,
            self.config.shutdown_step_timeout,
        )
        .already_shut_down(process.shutdown_flag.is_marked());

        let report = {
            let mut control = ChildControl {
                child: &mut process.child,
            };
            shutdown::escalate(&name, &plan, &mut control, &self.channel).await
        };

        if !report.exited {
            log::warn!("[{}] Killing through the process handle", name);
            if let Err(e) = process.child.start_kill() {
                log::error!("[{}] Kill failed: {}", name, e);
            }
        }

        let waited = process.child.wait().await;
        drain_readers(process.readers).await;

        match waited {
            Ok(status) => {
                let code = status.code();
                log::info!("[{}] Process exited with code: {:?}", name, code);
                self.state = SupervisorState::Stopped(code);
                Ok(code)
            }
            Err(e) => {
                self.state = SupervisorState::Stopped(None);
                Err(SuperviseError::Wait { name, source: e })
            }
        }
    }
}

/// Errors raised while starting or stopping a supervised process
#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    #[error("Failed to spawn process '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Process '{name}' failed to start: {message}")]
    StartupFailed { name: String, message: String },

    #[error("Process '{name}' was not ready within {timeout:?}, output:\n{output}")]
    StartupTimeout {
        name: String,
        timeout: Duration,
        output: String,
    },

    #[error("Process '{0}' is not running")]
    NotRunning(String),

    #[error("Process '{0}' was already started")]
    AlreadyStarted(String),

    #[error("Failed to reap process '{name}': {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(executable: &str) -> SupervisorConfig {
        SupervisorConfig::new("test", executable, "127.0.0.1:27017".parse().unwrap())
    }

    #[tokio::test]
    async fn test_spawn_failure_is_terminal() {
        let mut supervisor = Supervisor::new(config("/nonexistent/embedmongo/mongod"));

        let err = supervisor.start().await.err().unwrap();
        assert!(matches!(err, SuperviseError::SpawnFailed { .. }));
        assert_eq!(supervisor.state(), SupervisorState::StartupFailed);
        assert!(supervisor.state().is_terminal());

        let err = supervisor.start().await.err().unwrap();
        assert!(matches!(err, SuperviseError::AlreadyStarted(_)));
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let mut supervisor = Supervisor::new(config("mongod"));
        assert!(matches!(
            supervisor.stop().await,
            Err(SuperviseError::NotRunning(_))
        ));
        assert_eq!(supervisor.state(), SupervisorState::NotStarted);
        assert!(!supervisor.check_alive());
    }
}
