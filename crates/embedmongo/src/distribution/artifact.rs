//! Download artifact descriptors

use crate::platform::Os;
use serde::Serialize;
use std::fmt;

/// Archive container format of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Tgz,
    Zip,
}

impl ArchiveType {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveType::Tgz => ".tgz",
            ArchiveType::Zip => ".zip",
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveType::Tgz => write!(f, "tgz"),
            ArchiveType::Zip => write!(f, "zip"),
        }
    }
}

/// Everything needed to fetch an archive and find executables inside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    pub archive: ArchiveType,
    /// Absolute URL, or a path relative to the download base URL
    pub url: String,
    /// Directory inside the archive's top-level folder holding the executables
    pub bin_dir: String,
    /// `.exe` on Windows, empty elsewhere
    pub executable_suffix: String,
}

impl ArtifactDescriptor {
    pub fn new(archive: ArchiveType, url: impl Into<String>, os: Os) -> Self {
        Self {
            archive,
            url: url.into(),
            bin_dir: "bin".to_string(),
            executable_suffix: os.executable_suffix().to_string(),
        }
    }

    /// True when the URL already carries a scheme
    pub fn is_absolute(&self) -> bool {
        ["http://", "https://", "file://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }

    /// Resolve a relative URL against `base_url`; absolute URLs are kept
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        if !self.is_absolute() {
            self.url = format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                self.url.trim_start_matches('/')
            );
        }
        self
    }

    /// Last path segment of the URL, e.g. `mongodb-linux-x86_64-4.0.12.tgz`
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    /// File name without the archive extension; also the archive's top-level folder
    pub fn archive_stem(&self) -> &str {
        let name = self.file_name();
        name.strip_suffix(self.archive.extension()).unwrap_or(name)
    }

    /// Archive entry of an executable, relative to the top-level folder
    pub fn executable_entry(&self, executable: &str) -> String {
        format!("{}/{}{}", self.bin_dir, executable, self.executable_suffix)
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_url_joined_with_base() {
        let artifact = ArtifactDescriptor::new(
            ArchiveType::Tgz,
            "linux/mongodb-linux-x86_64-4.0.12.tgz",
            Os::Linux,
        )
        .with_base_url("https://fastdl.mongodb.org/");
        assert_eq!(
            artifact.url,
            "https://fastdl.mongodb.org/linux/mongodb-linux-x86_64-4.0.12.tgz"
        );
        assert_eq!(artifact.archive_stem(), "mongodb-linux-x86_64-4.0.12");
    }

    #[test]
    fn test_absolute_url_untouched() {
        let artifact = ArtifactDescriptor::new(
            ArchiveType::Zip,
            "https://mirror.internal/mongo.zip",
            Os::Windows,
        )
        .with_base_url("https://fastdl.mongodb.org");
        assert_eq!(artifact.url, "https://mirror.internal/mongo.zip");
        assert_eq!(artifact.executable_entry("mongod"), "bin/mongod.exe");
    }
}
