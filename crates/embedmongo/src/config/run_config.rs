//! Run configuration YAML schema

use crate::command::Command;
use crate::distribution::DEFAULT_BASE_URL;
use crate::platform::{BitSize, CpuArch, Os, OsVersion, Platform, PlatformError};
use crate::runtime::SupervisorConfig;
use crate::store::{DirectoryStore, ARTIFACT_DIR_ENV};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One server (or tool) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Server version, e.g. "4.0.12" or "latest"
    pub version: Version,

    /// Replace parts of the detected host platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformOverride>,

    #[serde(default = "default_command")]
    pub command: Command,

    #[serde(default = "default_bind_ip")]
    pub bind_ip: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Data directory (mongod only)
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Appended verbatim after the composed arguments
    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Bounded wait after each shutdown step
    #[serde(default = "default_shutdown_step_timeout_ms")]
    pub shutdown_step_timeout_ms: u64,

    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,

    /// Root of the extracted archives
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
}

fn default_command() -> Command {
    Command::Mongod
}

fn default_bind_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    27017
}

fn default_startup_timeout_ms() -> u64 {
    20_000
}

fn default_shutdown_step_timeout_ms() -> u64 {
    5_000
}

fn default_download_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Platform fields that replace the detected ones.
///
/// Values use the same names the CLI accepts (`osx`, `aarch64`, `64`,
/// `ubuntu2004`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOverride {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub bits: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
}

impl PlatformOverride {
    /// True when nothing is overridden
    pub fn is_empty(&self) -> bool {
        self.os.is_none() && self.arch.is_none() && self.bits.is_none() && self.os_version.is_none()
    }

    /// Apply the override on top of `base`.
    ///
    /// Switching the OS drops the detected OS version, since it belongs to
    /// the host OS.
    pub fn apply(&self, base: Platform) -> Result<Platform, PlatformError> {
        let mut platform = base;
        if let Some(os) = &self.os {
            let os: Os = os.parse()?;
            if os != platform.os {
                platform.os_version = None;
            }
            platform.os = os;
        }
        if let Some(arch) = &self.arch {
            platform.arch = arch.parse::<CpuArch>()?;
        }
        if let Some(bits) = &self.bits {
            platform.bits = bits.parse::<BitSize>()?;
        }
        if let Some(os_version) = &self.os_version {
            platform = Platform {
                os_version: None,
                ..platform
            }
            .with_os_version(os_version.parse::<OsVersion>()?)?;
        }
        Ok(platform)
    }

    /// Check every field parses without knowing the host.
    ///
    /// The OS and OS version are only checked against each other when both
    /// are given; a lone OS version is matched against the host later.
    pub fn validate(&self) -> Result<(), PlatformError> {
        let os = self.os.as_deref().map(str::parse::<Os>).transpose()?;
        if let Some(arch) = &self.arch {
            arch.parse::<CpuArch>()?;
        }
        if let Some(bits) = &self.bits {
            bits.parse::<BitSize>()?;
        }
        let os_version = self
            .os_version
            .as_deref()
            .map(str::parse::<OsVersion>)
            .transpose()?;
        if let (Some(os), Some(os_version)) = (os, os_version) {
            if os_version.os() != os {
                return Err(PlatformError::MismatchedOsVersion { os, os_version });
            }
        }
        Ok(())
    }
}

impl RunConfig {
    /// Defaults for everything but the version
    pub fn new(version: Version) -> Self {
        Self {
            version,
            platform: None,
            command: default_command(),
            bind_ip: default_bind_ip(),
            port: default_port(),
            db_path: None,
            extra_args: Vec::new(),
            env: HashMap::new(),
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_step_timeout_ms: default_shutdown_step_timeout_ms(),
            download_base_url: default_download_base_url(),
            artifact_dir: None,
        }
    }

    /// Load a run configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a run configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_yaml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the run configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("'port' must not be 0".to_string()));
        }
        if self.startup_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "'startup_timeout_ms' must be greater than 0".to_string(),
            ));
        }
        if self.shutdown_step_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "'shutdown_step_timeout_ms' must be greater than 0".to_string(),
            ));
        }
        if self.download_base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "'download_base_url' must not be empty".to_string(),
            ));
        }
        if let Some(platform) = &self.platform {
            platform.validate()?;
        }
        Ok(())
    }

    /// Target platform: the detected host with the configured override applied
    pub fn target_platform(&self) -> Result<Platform, ConfigError> {
        let host = crate::platform::detect()?;
        match &self.platform {
            Some(platform) if !platform.is_empty() => Ok(platform.apply(host)?),
            _ => Ok(host),
        }
    }

    /// Address the server binds and the shutdown command is sent to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_step_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_step_timeout_ms)
    }

    /// Extraction root: `flag` from the command line, `$EMBEDMONGO_ARTIFACT_DIR`,
    /// the configured directory, then `~/.embedmongo/extracted`
    pub fn artifact_dir(&self, flag: Option<&Path>) -> Option<PathBuf> {
        let env = std::env::var_os(ARTIFACT_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        pick_artifact_dir(flag, env, self.artifact_dir.as_deref())
    }

    /// Command line for the configured executable
    pub fn server_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match self.command {
            Command::Mongod | Command::Mongos => {
                args.extend([
                    "--port".to_string(),
                    self.port.to_string(),
                    "--bind_ip".to_string(),
                    self.bind_ip.to_string(),
                ]);
            }
            _ => {
                args.extend([
                    "--host".to_string(),
                    self.bind_ip.to_string(),
                    "--port".to_string(),
                    self.port.to_string(),
                ]);
            }
        }
        if self.command == Command::Mongod {
            if let Some(db_path) = &self.db_path {
                args.push("--dbpath".to_string());
                args.push(db_path.display().to_string());
            }
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Supervisor settings for running `executable` with this configuration
    pub fn supervisor_config(&self, executable: impl Into<PathBuf>) -> SupervisorConfig {
        let mut config = SupervisorConfig::new(
            format!("{}:{}", self.command, self.port),
            executable,
            self.socket_addr(),
        );
        config.args = self.server_args();
        config.env = self.env.clone();
        config.patterns = self.command.startup_patterns();
        config.startup_timeout = self.startup_timeout();
        config.shutdown_step_timeout = self.shutdown_step_timeout();
        config
    }
}

fn pick_artifact_dir(
    flag: Option<&Path>,
    env: Option<PathBuf>,
    file: Option<&Path>,
) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or(env)
        .or_else(|| file.map(Path::to_path_buf))
        .or_else(DirectoryStore::default_root)
}

/// Errors that can occur when loading a run configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
