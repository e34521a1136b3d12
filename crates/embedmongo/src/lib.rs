//! embedmongo
//!
//! Provisioning and supervision of throwaway MongoDB servers for tests.
//!
//! # Overview
//!
//! - Resolve which prebuilt archive serves a version on a platform
//!   ([`Resolver`], backed by ordered first-match rule tables per OS)
//! - Locate the executable of an already extracted archive ([`DirectoryStore`])
//! - Start the server, waiting for its readiness line ([`Supervisor::start`])
//! - Stop it through an escalating shutdown: wire protocol shutdown command
//!   first, OS signals after ([`Supervisor::stop`])
//!
//! # Example Run File
//!
//! ```yaml
//! version: "4.4.1"
//! command: mongod
//! port: 27100
//! db_path: /tmp/embedmongo-db
//! extra_args: ["--nojournal"]
//! platform:
//!   os_version: ubuntu2004
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod distribution;
pub mod platform;
pub mod runtime;
pub mod store;
pub mod version;

pub use cli::Args;
pub use command::Command;
pub use config::{ConfigError, PlatformOverride, RunConfig};
pub use distribution::{
    ArchiveType, ArtifactDescriptor, ArtifactFinder, Distribution, Match, ResolveError, Resolver,
    RuleTable, UrlTemplate,
};
pub use platform::{BitSize, CpuArch, Os, OsVersion, Platform, PlatformError};
pub use runtime::{
    OutputClassifier, Pid, RunningProcess, ShutdownFlag, StartupPatterns, SuperviseError,
    Supervisor, SupervisorConfig, SupervisorState,
};
pub use store::{ArtifactStore, DirectoryStore, StoreError};
pub use version::{compress_ranges, NumericVersion, Version, VersionError, VersionRange};
