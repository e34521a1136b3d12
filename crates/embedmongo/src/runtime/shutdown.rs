//! Escalating shutdown of a running server
//!
//! The chain is a fixed list of steps tried in order. Before every step the
//! process is checked for liveness, and every step that was actually delivered
//! is given a bounded wait for the process to exit before the next, more
//! forceful step runs.

use crate::runtime::classifier::Pid;
use crate::runtime::signal::OsSignal;
use crate::runtime::wire;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

/// One rung of the shutdown escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    /// Shutdown command in the legacy `OP_QUERY` framing
    LegacyCommand,
    /// Shutdown command in the current `OP_MSG` framing
    Command,
    /// Forceful OS kill
    Kill,
    /// Graceful OS terminate
    Terminate,
    /// Second forceful kill
    KillRetry,
}

impl ShutdownStep {
    /// Every step, in the order they are tried
    pub const ESCALATION: [ShutdownStep; 5] = [
        ShutdownStep::LegacyCommand,
        ShutdownStep::Command,
        ShutdownStep::Kill,
        ShutdownStep::Terminate,
        ShutdownStep::KillRetry,
    ];

    /// Wire payload for the command steps
    pub fn payload(&self) -> Option<&'static [u8]> {
        match self {
            ShutdownStep::LegacyCommand => Some(&wire::LEGACY_SHUTDOWN),
            ShutdownStep::Command => Some(&wire::SHUTDOWN),
            _ => None,
        }
    }

    /// OS signal for the signal steps
    pub fn signal(&self) -> Option<OsSignal> {
        match self {
            ShutdownStep::Kill | ShutdownStep::KillRetry => Some(OsSignal::Kill),
            ShutdownStep::Terminate => Some(OsSignal::Terminate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShutdownStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShutdownStep::LegacyCommand => "legacy shutdown command",
            ShutdownStep::Command => "shutdown command",
            ShutdownStep::Kill => "kill",
            ShutdownStep::Terminate => "terminate",
            ShutdownStep::KillRetry => "kill retry",
        };
        write!(f, "{}", name)
    }
}

/// One-shot marker that a shutdown command already reached the server
/// through some other client
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the shutdown as sent. Returns `true` only for the first call.
    pub fn mark(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// Check if a shutdown command was already sent
    pub fn is_marked(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Liveness and signalling of the supervised process
pub trait ProcessControl: Send {
    fn is_alive(&mut self) -> bool;

    fn signal(&mut self, pid: u32, signal: OsSignal) -> io::Result<()>;
}

/// How the server reacted to a shutdown command.
///
/// A refused connection and a closed stream both count as accepted, since a
/// server tearing down its listener looks the same from the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAck {
    Replied,
    Closed,
    Refused,
}

/// Transport for the raw shutdown payloads
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn send(&self, address: SocketAddr, payload: &[u8]) -> io::Result<CommandAck>;
}

/// Short-lived plain TCP connection per command
#[derive(Debug, Clone)]
pub struct TcpCommandChannel {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for TcpCommandChannel {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl CommandChannel for TcpCommandChannel {
    async fn send(&self, address: SocketAddr, payload: &[u8]) -> io::Result<CommandAck> {
        let mut stream =
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Ok(CommandAck::Refused)
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {} timed out", address),
                    ))
                }
            };

        if let Err(e) = stream.write_all(payload).await {
            return match e.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => Ok(CommandAck::Closed),
                _ => Err(e),
            };
        }

        let mut header = [0u8; wire::HEADER_LEN];
        match tokio::time::timeout(self.read_timeout, stream.read_exact(&mut header)).await {
            Ok(Ok(_)) => Ok(CommandAck::Replied),
            _ => Ok(CommandAck::Closed),
        }
    }
}

/// Inputs of a single escalation run
#[derive(Debug, Clone)]
pub struct ShutdownPlan {
    /// Address the server listens on
    pub address: SocketAddr,
    /// PID captured during startup
    pub pid: Pid,
    /// A shutdown command was already issued elsewhere
    pub already_shut_down: bool,
    /// Bounded wait for exit after each delivered step
    pub step_timeout: Duration,
    pub poll_interval: Duration,
}

impl ShutdownPlan {
    /// Plan the stop of the server at `address`
    pub fn new(address: SocketAddr, pid: Pid, step_timeout: Duration) -> Self {
        Self {
            address,
            pid,
            already_shut_down: false,
            step_timeout,
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Skip the shutdown commands, a previous call already sent one
    pub fn already_shut_down(mut self, already: bool) -> Self {
        self.already_shut_down = already;
        self
    }
}

/// Why a step was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyShutDown,
    NotLoopback,
    UnknownPid,
}

/// What the escalation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationReport {
    /// Steps that were delivered or tried, in order
    pub attempted: Vec<ShutdownStep>,
    pub skipped: Vec<(ShutdownStep, SkipReason)>,
    /// Step after which the process was seen exiting
    pub stopped_after: Option<ShutdownStep>,
    /// Whether the process was gone when escalation ended
    pub exited: bool,
}

async fn wait_for_exit<P: ProcessControl>(process: &mut P, plan: &ShutdownPlan) -> bool {
    let deadline = Instant::now() + plan.step_timeout;
    loop {
        if !process.is_alive() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(plan.poll_interval).await;
    }
}

async fn deliver<P, C>(
    name: &str,
    step: ShutdownStep,
    plan: &ShutdownPlan,
    process: &mut P,
    channel: &C,
) -> Result<bool, SkipReason>
where
    P: ProcessControl,
    C: CommandChannel,
{
    if let Some(payload) = step.payload() {
        return match channel.send(plan.address, payload).await {
            Ok(ack) => {
                log::debug!("[{}] {} answered with {:?}", name, step, ack);
                Ok(true)
            }
            Err(e) => {
                log::warn!("[{}] {} to {} failed: {}", name, step, plan.address, e);
                Ok(false)
            }
        };
    }

    let signal = step.signal().unwrap_or(OsSignal::Kill);
    let pid = plan.pid.known().ok_or(SkipReason::UnknownPid)?;
    match process.signal(pid, signal) {
        Ok(()) => Ok(true),
        Err(e) => {
            log::warn!("[{}] Sending {} to pid {} failed: {}", name, signal, pid, e);
            Ok(false)
        }
    }
}

/// Run the escalation chain until the process exits or every step is used up
pub async fn escalate<P, C>(
    name: &str,
    plan: &ShutdownPlan,
    process: &mut P,
    channel: &C,
) -> EscalationReport
where
    P: ProcessControl,
    C: CommandChannel,
{
    let mut report = EscalationReport::default();

    let command_skip = if plan.already_shut_down {
        Some(SkipReason::AlreadyShutDown)
    } else if !plan.address.ip().is_loopback() {
        log::warn!(
            "[{}] Not sending a raw shutdown command to non-loopback address {}",
            name,
            plan.address
        );
        Some(SkipReason::NotLoopback)
    } else {
        None
    };

    if command_skip == Some(SkipReason::AlreadyShutDown) && process.is_alive() {
        log::info!("[{}] Shutdown command already sent, waiting for exit", name);
        wait_for_exit(process, plan).await;
    }

    for step in ShutdownStep::ESCALATION {
        if !process.is_alive() {
            report.exited = true;
            return report;
        }

        if let (Some(reason), Some(_)) = (command_skip, step.payload()) {
            report.skipped.push((step, reason));
            continue;
        }

        let delivered = match deliver(name, step, plan, process, channel).await {
            Ok(delivered) => delivered,
            Err(reason) => {
                log::debug!("[{}] Skipping {}: {:?}", name, step, reason);
                report.skipped.push((step, reason));
                continue;
            }
        };
        report.attempted.push(step);

        if delivered && wait_for_exit(process, plan).await {
            log::info!("[{}] Process stopped after {}", name, step);
            report.stopped_after = Some(step);
            report.exited = true;
            return report;
        }

        log::warn!("[{}] {} did not stop the process, escalating", name, step);
    }

    report.exited = !process.is_alive();
    if !report.exited {
        log::error!("[{}] Process survived every shutdown step", name);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    struct FakeProcess {
        alive: Arc<AtomicBool>,
        signals: Vec<OsSignal>,
        /// Index of the signal that ends the process
        fatal_signal: Option<usize>,
    }

    impl FakeProcess {
        fn new(alive: Arc<AtomicBool>, fatal_signal: Option<usize>) -> Self {
            Self {
                alive,
                signals: Vec::new(),
                fatal_signal,
            }
        }
    }

    impl ProcessControl for FakeProcess {
        fn is_alive(&mut self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn signal(&mut self, _pid: u32, signal: OsSignal) -> io::Result<()> {
            if self.fatal_signal == Some(self.signals.len()) {
                self.alive.store(false, Ordering::SeqCst);
            }
            self.signals.push(signal);
            Ok(())
        }
    }

    struct FakeChannel {
        alive: Arc<AtomicBool>,
        sent: Mutex<Vec<Vec<u8>>>,
        stops_on: Option<&'static [u8]>,
    }

    impl FakeChannel {
        fn new(alive: Arc<AtomicBool>, stops_on: Option<&'static [u8]>) -> Self {
            Self {
                alive,
                sent: Mutex::new(Vec::new()),
                stops_on,
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandChannel for FakeChannel {
        async fn send(&self, _address: SocketAddr, payload: &[u8]) -> io::Result<CommandAck> {
            self.sent.lock().unwrap().push(payload.to_vec());
            if self.stops_on == Some(payload) {
                self.alive.store(false, Ordering::SeqCst);
            }
            Ok(CommandAck::Closed)
        }
    }

    fn plan(address: &str, pid: Pid) -> ShutdownPlan {
        let mut plan = ShutdownPlan::new(address.parse().unwrap(), pid, Duration::from_millis(30));
        plan.poll_interval = Duration::from_millis(5);
        plan
    }

    const LOCAL: &str = "127.0.0.1:27017";

    #[tokio::test]
    async fn test_kill_success_ends_escalation() {
        let alive = Arc::new(AtomicBool::new(true));
        let mut process = FakeProcess::new(alive.clone(), Some(0));
        let channel = FakeChannel::new(alive, None);

        let report = escalate("test", &plan(LOCAL, Pid::Known(42)), &mut process, &channel).await;

        assert_eq!(
            report.attempted,
            vec![
                ShutdownStep::LegacyCommand,
                ShutdownStep::Command,
                ShutdownStep::Kill
            ]
        );
        assert_eq!(report.stopped_after, Some(ShutdownStep::Kill));
        assert!(report.exited);
        // terminate and the kill retry never ran
        assert_eq!(process.signals, vec![OsSignal::Kill]);
        assert_eq!(
            channel.sent(),
            vec![wire::LEGACY_SHUTDOWN.to_vec(), wire::SHUTDOWN.to_vec()]
        );
    }

    #[tokio::test]
    async fn test_already_shut_down_sends_no_payload() {
        let alive = Arc::new(AtomicBool::new(true));
        let mut process = FakeProcess::new(alive.clone(), Some(0));
        let channel = FakeChannel::new(alive, None);
        let plan = plan(LOCAL, Pid::Known(42)).already_shut_down(true);

        let report = escalate("test", &plan, &mut process, &channel).await;

        assert!(channel.sent().is_empty());
        assert_eq!(report.attempted, vec![ShutdownStep::Kill]);
        assert_eq!(
            report.skipped,
            vec![
                (ShutdownStep::LegacyCommand, SkipReason::AlreadyShutDown),
                (ShutdownStep::Command, SkipReason::AlreadyShutDown),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_loopback_goes_straight_to_signals() {
        let alive = Arc::new(AtomicBool::new(true));
        let mut process = FakeProcess::new(alive.clone(), Some(1));
        let channel = FakeChannel::new(alive, None);

        let report = escalate(
            "test",
            &plan("10.1.2.3:27017", Pid::Known(42)),
            &mut process,
            &channel,
        )
        .await;

        assert!(channel.sent().is_empty());
        assert_eq!(
            report.skipped,
            vec![
                (ShutdownStep::LegacyCommand, SkipReason::NotLoopback),
                (ShutdownStep::Command, SkipReason::NotLoopback),
            ]
        );
        assert_eq!(report.stopped_after, Some(ShutdownStep::Terminate));
        assert_eq!(process.signals, vec![OsSignal::Kill, OsSignal::Terminate]);
    }

    #[tokio::test]
    async fn test_legacy_command_is_enough() {
        let alive = Arc::new(AtomicBool::new(true));
        let mut process = FakeProcess::new(alive.clone(), None);
        let channel = FakeChannel::new(alive, Some(&wire::LEGACY_SHUTDOWN));

        let report = escalate("test", &plan(LOCAL, Pid::Known(42)), &mut process, &channel).await;

        assert_eq!(report.attempted, vec![ShutdownStep::LegacyCommand]);
        assert_eq!(report.stopped_after, Some(ShutdownStep::LegacyCommand));
        assert_eq!(channel.sent().len(), 1);
        assert!(process.signals.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_pid_skips_signals() {
        let alive = Arc::new(AtomicBool::new(true));
        let mut process = FakeProcess::new(alive.clone(), Some(0));
        let channel = FakeChannel::new(alive, None);

        let report = escalate("test", &plan(LOCAL, Pid::Unknown), &mut process, &channel).await;

        assert!(!report.exited);
        assert!(process.signals.is_empty());
        assert_eq!(
            report.skipped.iter().map(|(step, _)| *step).collect::<Vec<_>>(),
            vec![
                ShutdownStep::Kill,
                ShutdownStep::Terminate,
                ShutdownStep::KillRetry
            ]
        );
        assert!(report
            .skipped
            .iter()
            .all(|(_, reason)| *reason == SkipReason::UnknownPid));
    }

    #[tokio::test]
    async fn test_every_step_used_up() {
        let alive = Arc::new(AtomicBool::new(true));
        let mut process = FakeProcess::new(alive.clone(), None);
        let channel = FakeChannel::new(alive, None);

        let report = escalate("test", &plan(LOCAL, Pid::Known(42)), &mut process, &channel).await;

        assert_eq!(report.attempted, ShutdownStep::ESCALATION.to_vec());
        assert_eq!(
            process.signals,
            vec![OsSignal::Kill, OsSignal::Terminate, OsSignal::Kill]
        );
        assert_eq!(report.stopped_after, None);
        assert!(!report.exited);
    }

    #[tokio::test]
    async fn test_dead_process_needs_nothing() {
        let alive = Arc::new(AtomicBool::new(false));
        let mut process = FakeProcess::new(alive.clone(), None);
        let channel = FakeChannel::new(alive, None);

        let report = escalate("test", &plan(LOCAL, Pid::Known(42)), &mut process, &channel).await;

        assert!(report.exited);
        assert!(report.attempted.is_empty());
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn test_shutdown_flag_is_one_shot() {
        let flag = ShutdownFlag::new();
        let shared = flag.clone();
        assert!(!flag.is_marked());
        assert!(shared.mark());
        assert!(!flag.mark());
        assert!(flag.is_marked());
    }

    #[tokio::test]
    async fn test_tcp_channel_refused_counts_as_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let ack = TcpCommandChannel::default()
            .send(address, &wire::SHUTDOWN)
            .await
            .unwrap();
        assert_eq!(ack, CommandAck::Refused);
    }

    #[tokio::test]
    async fn test_tcp_channel_closed_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = vec![0u8; wire::LEGACY_SHUTDOWN.len()];
            socket.read_exact(&mut received).await.unwrap();
            received
        });

        let ack = TcpCommandChannel::default()
            .send(address, &wire::LEGACY_SHUTDOWN)
            .await
            .unwrap();

        assert_eq!(ack, CommandAck::Closed);
        assert_eq!(server.await.unwrap(), wire::LEGACY_SHUTDOWN.to_vec());
    }

    #[tokio::test]
    async fn test_tcp_channel_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = vec![0u8; wire::SHUTDOWN.len()];
            socket.read_exact(&mut received).await.unwrap();
            socket.write_all(&[0u8; wire::HEADER_LEN]).await.unwrap();
            // hold the socket until the client is done reading
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let ack = TcpCommandChannel::default()
            .send(address, &wire::SHUTDOWN)
            .await
            .unwrap();
        assert_eq!(ack, CommandAck::Replied);
    }
}
