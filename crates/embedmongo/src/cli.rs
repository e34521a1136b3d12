//! Command-line interface for embedmongo

use crate::command::Command;
use crate::config::{ConfigError, PlatformOverride, RunConfig};
use crate::version::Version;
use argh::FromArgs;
use std::path::{Path, PathBuf};

/// resolve, provision and supervise MongoDB server binaries
#[derive(FromArgs, Debug)]
pub struct Args {
    /// log level (error, warn, info, debug, trace)
    #[argh(option, short = 'l', default = "String::from(\"info\")")]
    pub log_level: String,

    #[argh(subcommand)]
    pub command: SubCommand,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum SubCommand {
    Resolve(ResolveArgs),
    Detect(DetectArgs),
    Run(RunArgs),
    Ranges(RangesArgs),
}

/// print the download artifact for a version
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "resolve")]
pub struct ResolveArgs {
    /// server version, e.g. 4.0.12, 3.6 or latest
    #[argh(positional)]
    pub version: Version,

    /// operating system instead of the detected one (linux, windows, osx, ...)
    #[argh(option)]
    pub os: Option<String>,

    /// cpu architecture instead of the detected one (x86_64, aarch64, ...)
    #[argh(option)]
    pub arch: Option<String>,

    /// bit size instead of the detected one (32 or 64)
    #[argh(option)]
    pub bits: Option<String>,

    /// os release instead of the detected one (ubuntu2004, rhel8, ...)
    #[argh(option)]
    pub os_version: Option<String>,

    /// download base url (default: https://fastdl.mongodb.org/)
    #[argh(option)]
    pub base_url: Option<String>,

    /// print json instead of text
    #[argh(switch)]
    pub json: bool,
}

impl ResolveArgs {
    pub fn platform_override(&self) -> PlatformOverride {
        PlatformOverride {
            os: self.os.clone(),
            arch: self.arch.clone(),
            bits: self.bits.clone(),
            os_version: self.os_version.clone(),
        }
    }
}

/// print the detected host platform
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "detect")]
pub struct DetectArgs {
    /// print json instead of text
    #[argh(switch)]
    pub json: bool,
}

/// start a server from an extracted archive and stop it on ctrl+c
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "run")]
pub struct RunArgs {
    /// server version; overrides the config file
    #[argh(positional)]
    pub version: Option<Version>,

    /// path to a run configuration yaml file
    #[argh(option, short = 'c')]
    pub config: Option<String>,

    /// executable to run (mongod, mongos, ...)
    #[argh(option)]
    pub command: Option<Command>,

    /// port to listen on
    #[argh(option, short = 'p')]
    pub port: Option<u16>,

    /// data directory
    #[argh(option)]
    pub db_path: Option<String>,

    /// root of the extracted archives
    #[argh(option)]
    pub artifact_dir: Option<String>,

    /// extra environment variable (format: KEY=VALUE)
    #[argh(option, short = 'e', from_str_fn(parse_env_pair))]
    pub env: Vec<(String, String)>,

    /// startup timeout in milliseconds
    #[argh(option)]
    pub startup_timeout_ms: Option<u64>,
}

impl RunArgs {
    /// Load the config file if given and apply the command line on top
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        let mut config = match (&self.config, &self.version) {
            (Some(path), _) => RunConfig::from_file(path)?,
            (None, Some(version)) => RunConfig::new(version.clone()),
            (None, None) => {
                return Err(ConfigError::Validation(
                    "either a version or --config is required".to_string(),
                ))
            }
        };

        if let Some(version) = &self.version {
            config.version = version.clone();
        }
        if let Some(command) = self.command {
            config.command = command;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db_path) = &self.db_path {
            config.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(timeout) = self.startup_timeout_ms {
            config.startup_timeout_ms = timeout;
        }
        config.env.extend(self.env.iter().cloned());

        config.validate()?;
        Ok(config)
    }

    /// Extraction root for this run; `--artifact-dir` beats the environment
    /// and the config file
    pub fn artifact_dir(&self, config: &RunConfig) -> Option<PathBuf> {
        config.artifact_dir(self.artifact_dir.as_deref().map(Path::new))
    }
}

/// print adjacency-compressed ranges of the given versions
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "ranges")]
pub struct RangesArgs {
    /// versions to compress
    #[argh(positional)]
    pub versions: Vec<Version>,
}

/// Parse an environment variable in format "KEY=VALUE"
fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!(
            "Invalid environment variable '{}'. Expected 'KEY=VALUE'",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, argh::EarlyExit> {
        Args::from_args(&["embedmongo"], args)
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("MONGO_URL=mongodb://localhost:27017/?a=b"),
            Ok((
                "MONGO_URL".to_string(),
                "mongodb://localhost:27017/?a=b".to_string()
            ))
        );
        assert!(parse_env_pair("=value").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[test]
    fn test_resolve_subcommand() {
        let args =
            parse(&["resolve", "4.0.12", "--os", "linux", "--bits", "64", "--json"]).unwrap();
        assert_eq!(args.log_level, "info");
        let SubCommand::Resolve(resolve) = args.command else {
            panic!("expected resolve");
        };
        assert_eq!(resolve.version.as_canonical_str(), "4.0.12");
        assert!(resolve.json);
        assert_eq!(
            resolve.platform_override(),
            PlatformOverride {
                os: Some("linux".to_string()),
                bits: Some("64".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        assert!(parse(&["resolve", "four"]).is_err());
    }

    #[test]
    fn test_run_overrides() {
        let args = parse(&[
            "-l", "debug", "run", "3.6.8", "--port", "27100", "-e", "TZ=UTC", "--command", "mongos",
        ])
        .unwrap();
        assert_eq!(args.log_level, "debug");
        let SubCommand::Run(run) = args.command else {
            panic!("expected run");
        };

        let config = run.run_config().unwrap();
        assert_eq!(config.version.as_canonical_str(), "3.6.8");
        assert_eq!(config.artifact_dir, None);
        assert_eq!(config.port, 27100);
        assert_eq!(config.command, Command::Mongos);
        assert_eq!(config.env.get("TZ").map(String::as_str), Some("UTC"));
    }

    #[test]
    fn test_run_needs_version_or_config() {
        let SubCommand::Run(run) = parse(&["run"]).unwrap().command else {
            panic!("expected run");
        };
        assert!(matches!(run.run_config(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_run_version_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "version: \"4.0.12\"\nport: 27200\n").unwrap();

        let path = path.display().to_string();
        let SubCommand::Run(run) = parse(&["run", "latest", "--config", &path]).unwrap().command
        else {
            panic!("expected run");
        };
        let config = run.run_config().unwrap();
        assert_eq!(config.version, Version::latest());
        assert_eq!(config.port, 27200);
    }

    #[test]
    fn test_artifact_dir_flag_beats_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "version: \"4.0.12\"\nartifact_dir: /from/file\n").unwrap();

        let path = path.display().to_string();
        let args = parse(&["run", "--config", &path, "--artifact-dir", "/from/flag"]).unwrap();
        let SubCommand::Run(run) = args.command else {
            panic!("expected run");
        };
        let config = run.run_config().unwrap();
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/from/file")));
        assert_eq!(run.artifact_dir(&config), Some(PathBuf::from("/from/flag")));
    }

    #[test]
    fn test_ranges_subcommand() {
        let SubCommand::Ranges(ranges) = parse(&["ranges", "4.0.1", "4.0.2", "4.2.0"])
            .unwrap()
            .command
        else {
            panic!("expected ranges");
        };
        assert_eq!(ranges.versions.len(), 3);
    }
}
