//! Host platform detection

use super::{BitSize, CpuArch, Os, OsVersion, Platform, PlatformError};
use std::collections::HashMap;

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Detect the platform of the running host.
///
/// On Linux the distribution release is read from `os-release`; an unknown
/// or unreadable distribution leaves `os_version` empty so that generic
/// packages are selected.
pub fn detect() -> Result<Platform, PlatformError> {
    let os = std::env::consts::OS.parse::<Os>()?;
    let (arch, bits) = match std::env::consts::ARCH {
        "x86_64" => (CpuArch::X86, BitSize::B64),
        "x86" => (CpuArch::X86, BitSize::B32),
        "aarch64" => (CpuArch::Arm, BitSize::B64),
        "arm" => (CpuArch::Arm, BitSize::B32),
        other => return Err(PlatformError::UnsupportedHost(other.to_string())),
    };

    let mut platform = Platform::new(os, arch, bits);
    if os == Os::Linux {
        let os_release = OS_RELEASE_PATHS
            .iter()
            .find_map(|path| std::fs::read_to_string(path).ok());
        match os_release.as_deref().and_then(parse_os_release) {
            Some(os_version) => platform.os_version = Some(os_version),
            None => log::debug!("No known Linux distribution detected, using generic builds"),
        }
    }

    log::debug!("Detected platform: {}", platform);
    Ok(platform)
}

/// Map the contents of an `os-release` file onto a known distribution release
pub fn parse_os_release(content: &str) -> Option<OsVersion> {
    let fields: HashMap<&str, &str> = content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim().trim_matches('"').trim_matches('\'')))
        .collect();

    let id = fields.get("ID").copied().unwrap_or_default();
    let version_id = fields.get("VERSION_ID").copied().unwrap_or_default();
    let id_like = fields.get("ID_LIKE").copied().unwrap_or_default();

    let (major, minor) = split_release(version_id)?;

    match id {
        "ubuntu" | "pop" => ubuntu_release(major, minor),
        "linuxmint" => match major {
            17 => Some(OsVersion::Ubuntu1404),
            18 => Some(OsVersion::Ubuntu1604),
            19 => Some(OsVersion::Ubuntu1804),
            20 => Some(OsVersion::Ubuntu2004),
            m if m >= 21 => Some(OsVersion::Ubuntu2204),
            _ => None,
        },
        "debian" => debian_release(major),
        "rhel" | "centos" | "rocky" | "almalinux" | "ol" => rhel_release(major),
        "amzn" => match major {
            2 => Some(OsVersion::Amazon2),
            2023 => Some(OsVersion::Amazon2023),
            m if m >= 2015 => Some(OsVersion::Amazon),
            _ => None,
        },
        "sles" | "opensuse-leap" => match major {
            12 => Some(OsVersion::Suse12),
            15 => Some(OsVersion::Suse15),
            _ => None,
        },
        _ if id_like.split_whitespace().any(|like| like == "rhel") => rhel_release(major),
        _ => None,
    }
}

fn split_release(version_id: &str) -> Option<(u32, u32)> {
    let mut parts = version_id.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

/// Newest known LTS release not newer than the detected one
fn ubuntu_release(major: u32, minor: u32) -> Option<OsVersion> {
    const LTS: [((u32, u32), OsVersion); 5] = [
        ((22, 4), OsVersion::Ubuntu2204),
        ((20, 4), OsVersion::Ubuntu2004),
        ((18, 4), OsVersion::Ubuntu1804),
        ((16, 4), OsVersion::Ubuntu1604),
        ((14, 4), OsVersion::Ubuntu1404),
    ];
    LTS.iter()
        .find(|(release, _)| *release <= (major, minor))
        .map(|(_, os_version)| *os_version)
}

fn debian_release(major: u32) -> Option<OsVersion> {
    match major {
        7 => Some(OsVersion::Debian7),
        8 => Some(OsVersion::Debian8),
        9 => Some(OsVersion::Debian9),
        10 => Some(OsVersion::Debian10),
        11 => Some(OsVersion::Debian11),
        m if m >= 12 => Some(OsVersion::Debian12),
        _ => None,
    }
}

fn rhel_release(major: u32) -> Option<OsVersion> {
    match major {
        6 => Some(OsVersion::Rhel6),
        7 => Some(OsVersion::Rhel7),
        8 => Some(OsVersion::Rhel8),
        m if m >= 9 => Some(OsVersion::Rhel9),
        _ => None,
    }
}
