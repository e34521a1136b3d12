//! Windows builds, keyed by the server generation each era targeted

use super::matcher::Match;
use super::rules::{RuleTable, UrlTemplate};
use super::{between, v};
use crate::platform::{BitSize, CpuArch, Os, OsVersion};

pub(super) fn rules() -> RuleTable {
    RuleTable::new("windows")
        .rule(
            "win32-i386",
            Match::Bits(BitSize::B32).and(Match::version_between(v(2, 6, 0), v(3, 2, 22))),
            UrlTemplate::zip(Os::Windows, "win32/mongodb-win32-i386-{version}.zip"),
        )
        .reject(
            "32-bit Windows builds are not published after 3.2",
            Match::Bits(BitSize::B32),
        )
        .reject("no Windows builds for ARM", Match::Arch(CpuArch::Arm))
        // Hosts older than 2008 R2 need the unlabeled build, which overlaps
        // the 2008plus windows below
        .rule(
            "win32-x86_64-legacy",
            Match::os_version_in([OsVersion::WindowsLegacy])
                .and(Match::version_between(v(2, 6, 0), v(3, 4, 24))),
            UrlTemplate::zip(Os::Windows, "win32/mongodb-win32-x86_64-{version}.zip"),
        )
        .reject(
            "builds after 3.4 require Windows Server 2008 R2 or newer",
            Match::os_version_in([OsVersion::WindowsLegacy]),
        )
        .rule(
            "windows-x86_64",
            Match::version_from(v(4, 4, 0)),
            UrlTemplate::zip(Os::Windows, "windows/mongodb-windows-x86_64-{version}.zip"),
        )
        .rule(
            "win32-x86_64-2012plus",
            Match::version_between(v(4, 2, 0), v(4, 2, 25)),
            UrlTemplate::zip(Os::Windows, "win32/mongodb-win32-x86_64-2012plus-{version}.zip"),
        )
        .rule(
            "win32-x86_64-2008plus-ssl",
            Match::versions([between([3, 0, 0], [3, 6, 23]), between([4, 0, 0], [4, 0, 28])]),
            UrlTemplate::zip(
                Os::Windows,
                "win32/mongodb-win32-x86_64-2008plus-ssl-{version}.zip",
            ),
        )
        .rule(
            "win32-x86_64-2008plus",
            Match::version_between(v(2, 6, 0), v(2, 6, 12)),
            UrlTemplate::zip(Os::Windows, "win32/mongodb-win32-x86_64-2008plus-{version}.zip"),
        )
        .otherwise_reject("no Windows package published for this version")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Distribution, ResolveError};
    use crate::platform::Platform;
    use crate::version::Version;

    fn resolve(version: &str, platform: Platform) -> Result<String, ResolveError> {
        let distribution = Distribution::new(Version::parse(version).unwrap(), platform);
        rules().resolve(&distribution).map(|a| a.url)
    }

    fn win64() -> Platform {
        Platform::new(Os::Windows, CpuArch::X86, BitSize::B64)
    }

    #[test]
    fn test_eras() {
        assert_eq!(
            resolve("4.4.0", win64()).unwrap(),
            "windows/mongodb-windows-x86_64-4.4.0.zip"
        );
        assert_eq!(
            resolve("4.2.13", win64()).unwrap(),
            "win32/mongodb-win32-x86_64-2012plus-4.2.13.zip"
        );
        assert_eq!(
            resolve("3.6.8", win64()).unwrap(),
            "win32/mongodb-win32-x86_64-2008plus-ssl-3.6.8.zip"
        );
        assert_eq!(
            resolve("2.6.3", win64()).unwrap(),
            "win32/mongodb-win32-x86_64-2008plus-2.6.3.zip"
        );
    }

    #[test]
    fn test_only_4_4_and_newer_live_under_windows_dir() {
        for version in ["4.2.0", "4.2.13", "4.2.25"] {
            let url = resolve(version, win64()).unwrap();
            assert_eq!(url, format!("win32/mongodb-win32-x86_64-2012plus-{}.zip", version));
        }
        assert!(resolve("4.4.1", win64())
            .unwrap()
            .starts_with("windows/mongodb-windows-x86_64-"));
    }

    #[test]
    fn test_legacy_host_rule_shadows_2008plus() {
        let legacy = win64().with_os_version(OsVersion::WindowsLegacy).unwrap();
        assert_eq!(
            resolve("3.4.10", legacy).unwrap(),
            "win32/mongodb-win32-x86_64-3.4.10.zip"
        );
        assert!(matches!(
            resolve("4.0.12", legacy),
            Err(ResolveError::Unsupported { .. })
        ));

        let modern = win64().with_os_version(OsVersion::Windows2008R2Plus).unwrap();
        assert_eq!(
            resolve("3.4.10", modern).unwrap(),
            "win32/mongodb-win32-x86_64-2008plus-ssl-3.4.10.zip"
        );
    }

    #[test]
    fn test_32bit_cutoff() {
        let win32 = Platform::new(Os::Windows, CpuArch::X86, BitSize::B32);
        assert_eq!(
            resolve("3.2.22", win32).unwrap(),
            "win32/mongodb-win32-i386-3.2.22.zip"
        );
        assert!(matches!(
            resolve("3.4.0", win32),
            Err(ResolveError::Unsupported { reason, .. }) if reason.contains("32-bit")
        ));
    }

    #[test]
    fn test_release_gap_is_rejected() {
        // 4.1.x development releases were never published as 2008plus-ssl
        assert!(resolve("4.1.5", win64()).is_err());
    }
}
