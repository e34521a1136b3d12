//! OS level process signals by PID

use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsSignal {
    /// SIGKILL, or `taskkill /F`
    Kill,
    /// SIGTERM, or a plain `taskkill`
    Terminate,
}

impl std::fmt::Display for OsSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsSignal::Kill => write!(f, "kill"),
            OsSignal::Terminate => write!(f, "terminate"),
        }
    }
}

/// Deliver `signal` to `pid`
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: OsSignal) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let signal = match signal {
        OsSignal::Kill => Signal::SIGKILL,
        OsSignal::Terminate => Signal::SIGTERM,
    };
    kill(Pid::from_raw(raw), signal).map_err(io::Error::from)
}

/// Deliver `signal` to `pid` through `taskkill`
#[cfg(windows)]
pub fn send_signal(pid: u32, signal: OsSignal) -> io::Result<()> {
    let mut cmd = std::process::Command::new("taskkill");
    if signal == OsSignal::Kill {
        cmd.arg("/F");
    }
    let status = cmd
        .args(["/PID", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {}", status)))
    }
}

#[cfg(not(any(unix, windows)))]
pub fn send_signal(_pid: u32, _signal: OsSignal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_running_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        send_signal(pid, OsSignal::Terminate).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_out_of_range_pid() {
        let err = send_signal(u32::MAX, OsSignal::Kill).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
