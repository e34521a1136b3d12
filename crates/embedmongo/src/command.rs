//! Executables shipped in a MongoDB archive and how their output reads

use crate::platform::Os;
use crate::runtime::StartupPatterns;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// A tool from the server archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Mongod,
    Mongos,
    Mongo,
    MongoDump,
    MongoRestore,
    MongoImport,
}

const SERVER_SUCCESS: &[&str] = &[
    "waiting for connections on port",
    // structured logging, 4.4 and newer
    "\"msg\":\"Waiting for connections\"",
];

const SERVER_FAILURES: &[&str] = &[
    r"(?P<error>Address already in use)",
    r"(?P<error>error while loading shared libraries:.*)",
    r"(?P<error>Error parsing command line:.*)",
    r"(?P<error>Error parsing option .*)",
    r"(?P<error>Data directory .* not found.*)",
    r"(?P<error>DBPathInUse:.*)",
    r"(?P<error>exception in initAndListen.*)",
    r"ERROR: (?P<error>.*)",
];

const TOOL_FAILURES: &[&str] = &[
    r"(?P<error>error while loading shared libraries:.*)",
    r"Failed: (?P<error>.*)",
];

fn compile(success: &[&str], failures: &[&str]) -> StartupPatterns {
    let patterns = success
        .iter()
        .fold(StartupPatterns::new(), |patterns, needle| patterns.success(*needle));
    failures.iter().fold(patterns, |patterns, pattern| {
        patterns.try_failure(pattern).unwrap()
    })
}

static SERVER_PATTERNS: LazyLock<StartupPatterns> =
    LazyLock::new(|| compile(SERVER_SUCCESS, SERVER_FAILURES));

static TOOL_PATTERNS: LazyLock<StartupPatterns> =
    LazyLock::new(|| compile(&[], TOOL_FAILURES).succeed_on_exit());

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Mongod,
        Command::Mongos,
        Command::Mongo,
        Command::MongoDump,
        Command::MongoRestore,
        Command::MongoImport,
    ];

    /// Executable name without platform suffix
    pub fn base_name(&self) -> &'static str {
        match self {
            Command::Mongod => "mongod",
            Command::Mongos => "mongos",
            Command::Mongo => "mongo",
            Command::MongoDump => "mongodump",
            Command::MongoRestore => "mongorestore",
            Command::MongoImport => "mongoimport",
        }
    }

    /// Executable file name on `os`, e.g. `mongod.exe` on Windows
    pub fn executable_name(&self, os: Os) -> String {
        format!("{}{}", self.base_name(), os.executable_suffix())
    }

    /// Long running servers that listen on a port
    pub fn is_server(&self) -> bool {
        matches!(self, Command::Mongod | Command::Mongos)
    }

    /// Default readiness patterns.
    ///
    /// Servers are ready once they accept connections; client tools are done
    /// when their output ends.
    pub fn startup_patterns(&self) -> StartupPatterns {
        if self.is_server() {
            SERVER_PATTERNS.clone()
        } else {
            TOOL_PATTERNS.clone()
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|command| command.base_name() == lower)
            .ok_or_else(|| format!("Unknown command '{}'", s))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_name())
    }
}
