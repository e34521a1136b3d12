//! Locating executables of already extracted archives

use crate::command::Command;
use crate::distribution::ArtifactDescriptor;
use std::path::{Path, PathBuf};

/// Environment variable overriding the extraction root
pub const ARTIFACT_DIR_ENV: &str = "EMBEDMONGO_ARTIFACT_DIR";

/// Maps a resolved artifact to an executable on disk
pub trait ArtifactStore: Send + Sync {
    fn executable_path(
        &self,
        artifact: &ArtifactDescriptor,
        command: Command,
    ) -> Result<PathBuf, StoreError>;
}

/// Archives extracted below a root directory, one folder per archive:
/// `<root>/<archive stem>/bin/<executable>`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$EMBEDMONGO_ARTIFACT_DIR`, else `~/.embedmongo/extracted`
    pub fn default_root() -> Option<PathBuf> {
        std::env::var_os(ARTIFACT_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".embedmongo").join("extracted")))
    }

    /// Directory holding one folder per extracted archive
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the executable would be, whether or not it exists
    pub fn expected_path(&self, artifact: &ArtifactDescriptor, command: Command) -> PathBuf {
        self.root
            .join(artifact.archive_stem())
            .join(&artifact.bin_dir)
            .join(format!(
                "{}{}",
                command.base_name(),
                artifact.executable_suffix
            ))
    }
}

impl ArtifactStore for DirectoryStore {
    fn executable_path(
        &self,
        artifact: &ArtifactDescriptor,
        command: Command,
    ) -> Result<PathBuf, StoreError> {
        let path = self.expected_path(artifact, command);
        if path.is_file() {
            log::debug!("Found {} at {}", command, path.display());
            Ok(path)
        } else {
            Err(StoreError::NotExtracted {
                path,
                url: artifact.url.clone(),
            })
        }
    }
}

/// Errors that can occur while locating an executable
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Executable '{}' not found, download and extract {url} first", path.display())]
    NotExtracted { path: PathBuf, url: String },
}
