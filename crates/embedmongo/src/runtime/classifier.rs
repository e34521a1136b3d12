//! Startup classification of a child's output stream
//!
//! Reader tasks feed every line into a shared classifier. The first line that
//! matches a success substring or a failure pattern settles the outcome; the
//! readers keep draining afterwards so the child never blocks on a full pipe.

use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Name of the capture group holding the human readable failure text
pub const ERROR_GROUP: &str = "error";

/// Matches both the plain text banner (`MongoDB starting : pid=1234 port=...`)
/// and the structured log line (`"msg":"MongoDB starting","attr":{"pid":1234,...`)
static PID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"MongoDB starting(?:\s*:\s*pid=|".*?"pid":)(?P<pid>\d+)"#).unwrap()
});

/// Success substrings and failure regexes checked against each output line
#[derive(Debug, Clone, Default)]
pub struct StartupPatterns {
    success: Vec<String>,
    failures: Vec<Regex>,
    exit_is_success: bool,
}

impl StartupPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal substring that signals successful startup
    pub fn success(mut self, needle: impl Into<String>) -> Self {
        self.success.push(needle.into());
        self
    }

    /// Add a failure pattern. The `error` group, when present, becomes the
    /// reported message; otherwise the whole match does.
    pub fn failure(mut self, pattern: Regex) -> Self {
        self.failures.push(pattern);
        self
    }

    /// Compile and add a failure pattern
    pub fn try_failure(self, pattern: &str) -> Result<Self, regex::Error> {
        Ok(self.failure(Regex::new(pattern)?))
    }

    /// Treat the end of all output as success, for tools that run to completion
    pub fn succeed_on_exit(mut self) -> Self {
        self.exit_is_success = true;
        self
    }

    /// True when no pattern is configured
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failures.is_empty()
    }

    fn classify(&self, line: &str) -> Option<Terminal> {
        if self.success.iter().any(|needle| line.contains(needle.as_str())) {
            return Some(Terminal::Success);
        }

        self.failures.iter().find_map(|pattern| {
            pattern.captures(line).map(|caps| {
                let text = caps
                    .name(ERROR_GROUP)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                Terminal::Failure(text)
            })
        })
    }
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Outcome of waiting for the startup classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// A success line was seen
    Ready,
    /// A failure line was seen; carries the captured error text
    Failed(String),
    /// The timeout elapsed before either was seen
    NotFound,
    /// Every stream ended before either was seen
    Closed,
}

/// PID of the server as reported in its own output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pid {
    Known(u32),
    Unknown,
}

impl Pid {
    /// PID if the banner reported one
    pub fn known(&self) -> Option<u32> {
        match self {
            Pid::Known(pid) => Some(*pid),
            Pid::Unknown => None,
        }
    }
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pid::Known(pid) => write!(f, "{}", pid),
            Pid::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    Success,
    Failure(String),
    Closed,
}

struct Shared {
    patterns: StartupPatterns,
    lines: Mutex<Vec<String>>,
    open_streams: AtomicUsize,
    outcome: watch::Sender<Option<Terminal>>,
}

impl Shared {
    /// Record the first terminal outcome only
    fn settle(&self, terminal: Terminal) {
        self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(terminal);
            true
        });
    }
}

/// Cheaply cloneable handle shared between reader tasks and the waiter
#[derive(Clone)]
pub struct OutputClassifier {
    shared: Arc<Shared>,
}

impl OutputClassifier {
    /// Create a classifier waiting on `patterns`
    pub fn new(patterns: StartupPatterns) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                patterns,
                lines: Mutex::new(Vec::new()),
                open_streams: AtomicUsize::new(0),
                outcome,
            }),
        }
    }

    /// Feed one line of output.
    ///
    /// Lines are buffered until the outcome is settled; after that they are
    /// only drained.
    pub fn feed(&self, line: &str) {
        if self.shared.outcome.borrow().is_some() {
            return;
        }

        if let Ok(mut lines) = self.shared.lines.lock() {
            lines.push(line.to_string());
        }

        if let Some(terminal) = self.shared.patterns.classify(line) {
            self.shared.settle(terminal);
        }
    }

    /// Spawn a reader task draining `reader` until EOF
    pub fn attach<R>(&self, name: &str, reader: R, stream: OutputStream) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.shared.open_streams.fetch_add(1, Ordering::SeqCst);

        let classifier = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        match stream {
                            OutputStream::Stdout => log::debug!("[{}] {}", name, line),
                            OutputStream::Stderr => log::debug!("[{}] stderr: {}", name, line),
                        }
                        classifier.feed(&line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::debug!("[{}] Output stream {:?} failed: {}", name, stream, e);
                        break;
                    }
                }
            }
            classifier.stream_closed();
        })
    }

    fn stream_closed(&self) {
        if self.shared.open_streams.fetch_sub(1, Ordering::SeqCst) == 1 {
            let terminal = if self.shared.patterns.exit_is_success {
                Terminal::Success
            } else {
                Terminal::Closed
            };
            self.shared.settle(terminal);
        }
    }

    /// Wait until a terminal line is seen, every stream closed, or `timeout` elapsed
    pub async fn wait_for_result(&self, timeout: Duration) -> StartupOutcome {
        let mut rx = self.shared.outcome.subscribe();
        let settled = tokio::time::timeout(timeout, async {
            rx.wait_for(|outcome| outcome.is_some())
                .await
                .ok()
                .and_then(|outcome| outcome.clone())
        })
        .await;

        match settled {
            Ok(Some(Terminal::Success)) => StartupOutcome::Ready,
            Ok(Some(Terminal::Failure(message))) => StartupOutcome::Failed(message),
            Ok(Some(Terminal::Closed)) => StartupOutcome::Closed,
            Ok(None) | Err(_) => StartupOutcome::NotFound,
        }
    }

    /// Every buffered line, newline separated
    pub fn output(&self) -> String {
        self.shared
            .lines
            .lock()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default()
    }

    /// PID from the startup banner, or [`Pid::Unknown`] if it was not printed
    pub fn pid(&self) -> Pid {
        let Ok(lines) = self.shared.lines.lock() else {
            return Pid::Unknown;
        };
        lines
            .iter()
            .find_map(|line| PID_PATTERN.captures(line))
            .and_then(|caps| caps.name("pid")?.as_str().parse().ok())
            .map(Pid::Known)
            .unwrap_or(Pid::Unknown)
    }
}
