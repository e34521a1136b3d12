//! Target platform description (OS, CPU architecture, bit size, OS release)

mod detect;

pub use detect::{detect, parse_os_release};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Windows,
    #[serde(rename = "osx")]
    OsX,
    Solaris,
    #[serde(rename = "freebsd")]
    FreeBsd,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Windows => "windows",
            Os::OsX => "osx",
            Os::Solaris => "solaris",
            Os::FreeBsd => "freebsd",
        }
    }

    /// Suffix appended to executable names on this OS
    pub fn executable_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            _ => "",
        }
    }
}

impl FromStr for Os {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Os::Linux),
            "windows" | "win" | "win32" => Ok(Os::Windows),
            "osx" | "macos" | "darwin" => Ok(Os::OsX),
            "solaris" | "sunos" | "illumos" => Ok(Os::Solaris),
            "freebsd" => Ok(Os::FreeBsd),
            other => Err(PlatformError::UnknownOs(other.to_string())),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture family; the word size lives in [`BitSize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuArch {
    X86,
    Arm,
}

impl FromStr for CpuArch {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "x86_64" | "amd64" | "i386" | "i686" => Ok(CpuArch::X86),
            "arm" | "arm64" | "aarch64" => Ok(CpuArch::Arm),
            other => Err(PlatformError::UnknownArch(other.to_string())),
        }
    }
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuArch::X86 => write!(f, "x86"),
            CpuArch::Arm => write!(f, "arm"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitSize {
    #[serde(rename = "32")]
    B32,
    #[serde(rename = "64")]
    B64,
}

impl FromStr for BitSize {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "32" => Ok(BitSize::B32),
            "64" => Ok(BitSize::B64),
            other => Err(PlatformError::UnknownBitSize(other.to_string())),
        }
    }
}

impl fmt::Display for BitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitSize::B32 => write!(f, "32"),
            BitSize::B64 => write!(f, "64"),
        }
    }
}

/// OS release a package was built for.
///
/// Linux variants name a distribution and release, Windows variants name a
/// server generation. Derivative distributions are mapped onto their base
/// during detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsVersion {
    Ubuntu1404,
    Ubuntu1604,
    Ubuntu1804,
    Ubuntu2004,
    Ubuntu2204,
    Debian7,
    Debian8,
    Debian9,
    Debian10,
    Debian11,
    Debian12,
    Rhel6,
    Rhel7,
    Rhel8,
    Rhel9,
    Amazon,
    Amazon2,
    Amazon2023,
    Suse12,
    Suse15,
    /// Windows Server 2003 / 2008 (non R2) / Vista
    WindowsLegacy,
    /// Windows Server 2008 R2 / Windows 7 and later
    Windows2008R2Plus,
}

impl OsVersion {
    pub const ALL: [OsVersion; 22] = [
        OsVersion::Ubuntu1404,
        OsVersion::Ubuntu1604,
        OsVersion::Ubuntu1804,
        OsVersion::Ubuntu2004,
        OsVersion::Ubuntu2204,
        OsVersion::Debian7,
        OsVersion::Debian8,
        OsVersion::Debian9,
        OsVersion::Debian10,
        OsVersion::Debian11,
        OsVersion::Debian12,
        OsVersion::Rhel6,
        OsVersion::Rhel7,
        OsVersion::Rhel8,
        OsVersion::Rhel9,
        OsVersion::Amazon,
        OsVersion::Amazon2,
        OsVersion::Amazon2023,
        OsVersion::Suse12,
        OsVersion::Suse15,
        OsVersion::WindowsLegacy,
        OsVersion::Windows2008R2Plus,
    ];

    /// OS this release tag belongs to
    pub fn os(&self) -> Os {
        match self {
            OsVersion::WindowsLegacy | OsVersion::Windows2008R2Plus => Os::Windows,
            _ => Os::Linux,
        }
    }

    /// Short key, also the serialized form (`ubuntu1804`, `rhel7`, ...)
    pub fn key(&self) -> &'static str {
        match self {
            OsVersion::Ubuntu1404 => "ubuntu1404",
            OsVersion::Ubuntu1604 => "ubuntu1604",
            OsVersion::Ubuntu1804 => "ubuntu1804",
            OsVersion::Ubuntu2004 => "ubuntu2004",
            OsVersion::Ubuntu2204 => "ubuntu2204",
            OsVersion::Debian7 => "debian7",
            OsVersion::Debian8 => "debian8",
            OsVersion::Debian9 => "debian9",
            OsVersion::Debian10 => "debian10",
            OsVersion::Debian11 => "debian11",
            OsVersion::Debian12 => "debian12",
            OsVersion::Rhel6 => "rhel6",
            OsVersion::Rhel7 => "rhel7",
            OsVersion::Rhel8 => "rhel8",
            OsVersion::Rhel9 => "rhel9",
            OsVersion::Amazon => "amazon",
            OsVersion::Amazon2 => "amazon2",
            OsVersion::Amazon2023 => "amazon2023",
            OsVersion::Suse12 => "suse12",
            OsVersion::Suse15 => "suse15",
            OsVersion::WindowsLegacy => "windowslegacy",
            OsVersion::Windows2008R2Plus => "windows2008r2plus",
        }
    }
}

impl FromStr for OsVersion {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        OsVersion::ALL
            .iter()
            .copied()
            .find(|v| v.key() == wanted)
            .ok_or_else(|| PlatformError::UnknownOsVersion(s.to_string()))
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OsVersion::Ubuntu1404 => "Ubuntu 14.04",
            OsVersion::Ubuntu1604 => "Ubuntu 16.04",
            OsVersion::Ubuntu1804 => "Ubuntu 18.04",
            OsVersion::Ubuntu2004 => "Ubuntu 20.04",
            OsVersion::Ubuntu2204 => "Ubuntu 22.04",
            OsVersion::Debian7 => "Debian 7",
            OsVersion::Debian8 => "Debian 8",
            OsVersion::Debian9 => "Debian 9",
            OsVersion::Debian10 => "Debian 10",
            OsVersion::Debian11 => "Debian 11",
            OsVersion::Debian12 => "Debian 12",
            OsVersion::Rhel6 => "RHEL 6",
            OsVersion::Rhel7 => "RHEL 7",
            OsVersion::Rhel8 => "RHEL 8",
            OsVersion::Rhel9 => "RHEL 9",
            OsVersion::Amazon => "Amazon Linux",
            OsVersion::Amazon2 => "Amazon Linux 2",
            OsVersion::Amazon2023 => "Amazon Linux 2023",
            OsVersion::Suse12 => "SUSE 12",
            OsVersion::Suse15 => "SUSE 15",
            OsVersion::WindowsLegacy => "Windows (pre 2008 R2)",
            OsVersion::Windows2008R2Plus => "Windows Server 2008 R2+",
        };
        f.write_str(label)
    }
}

/// Immutable description of the machine a server binary must run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: CpuArch,
    pub bits: BitSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<OsVersion>,
}

impl Platform {
    pub fn new(os: Os, arch: CpuArch, bits: BitSize) -> Self {
        Self {
            os,
            arch,
            bits,
            os_version: None,
        }
    }

    /// Attach an OS release tag; it must belong to the same OS
    pub fn with_os_version(mut self, os_version: OsVersion) -> Result<Self, PlatformError> {
        if os_version.os() != self.os {
            return Err(PlatformError::MismatchedOsVersion {
                os: self.os,
                os_version,
            });
        }
        self.os_version = Some(os_version);
        Ok(self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}bit", self.os, self.arch, self.bits)?;
        if let Some(os_version) = &self.os_version {
            write!(f, " ({})", os_version)?;
        }
        Ok(())
    }
}

/// Errors that can occur while describing or detecting a platform
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("Unknown operating system '{0}'")]
    UnknownOs(String),

    #[error("Unknown CPU architecture '{0}'")]
    UnknownArch(String),

    #[error("Unknown bit size '{0}', expected 32 or 64")]
    UnknownBitSize(String),

    #[error("Unknown OS version '{0}'")]
    UnknownOsVersion(String),

    #[error("OS version '{os_version}' does not belong to {os}")]
    MismatchedOsVersion { os: Os, os_version: OsVersion },

    #[error("Unsupported host platform: {0}")]
    UnsupportedHost(String),
}
