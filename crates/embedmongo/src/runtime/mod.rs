//! Runtime process supervision

pub mod classifier;
pub mod shutdown;
pub mod signal;
pub mod supervisor;
pub mod wire;

pub use classifier::{OutputClassifier, OutputStream, Pid, StartupOutcome, StartupPatterns};
pub use shutdown::{
    escalate, CommandAck, CommandChannel, EscalationReport, ProcessControl, ShutdownFlag,
    ShutdownPlan, ShutdownStep, SkipReason, TcpCommandChannel,
};
pub use signal::{send_signal, OsSignal};
pub use supervisor::{
    RunningProcess, SuperviseError, Supervisor, SupervisorConfig, SupervisorState,
};
