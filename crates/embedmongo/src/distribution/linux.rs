//! Linux distribution specific builds
//!
//! Each entry lists the distribution releases it serves and the release
//! windows the download server actually carries for its package key. Newer
//! distribution releases fall back onto an older package key for versions
//! published before the matching key existed; those entries come after the
//! native ones.

use super::matcher::Match;
use super::rules::{RuleTable, UrlTemplate};
use super::between;
use crate::platform::{BitSize, CpuArch, Os, OsVersion};
use crate::version::VersionRange;

struct DistroBuild {
    os_versions: &'static [OsVersion],
    arch: CpuArch,
    key: &'static str,
    releases: &'static [VersionRange],
}

const LATEST: [u32; 3] = [u32::MAX, u32::MAX, u32::MAX];

const BUILDS: &[DistroBuild] = &[
    // Ubuntu
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu2204],
        arch: CpuArch::X86,
        key: "ubuntu2204",
        releases: &[between([6, 0, 4], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu2004],
        arch: CpuArch::X86,
        key: "ubuntu2004",
        releases: &[between([4, 4, 0], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu1804],
        arch: CpuArch::X86,
        key: "ubuntu1804",
        releases: &[
            between([4, 0, 1], [4, 0, 28]),
            between([4, 2, 0], [4, 2, 25]),
            between([4, 4, 0], [4, 4, 29]),
            between([5, 0, 0], [5, 0, 31]),
            between([6, 0, 0], [6, 0, 20]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu1604],
        arch: CpuArch::X86,
        key: "ubuntu1604",
        releases: &[
            between([3, 2, 7], [3, 2, 22]),
            between([3, 4, 0], [3, 4, 24]),
            between([3, 6, 0], [3, 6, 23]),
            between([4, 0, 0], [4, 0, 28]),
            between([4, 2, 0], [4, 2, 25]),
            between([4, 4, 0], [4, 4, 29]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu1404],
        arch: CpuArch::X86,
        key: "ubuntu1404",
        releases: &[
            between([3, 0, 0], [3, 0, 15]),
            between([3, 2, 0], [3, 2, 22]),
            between([3, 4, 0], [3, 4, 24]),
            between([3, 6, 0], [3, 6, 23]),
            between([4, 0, 0], [4, 0, 28]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu2204],
        arch: CpuArch::Arm,
        key: "ubuntu2204",
        releases: &[between([6, 0, 4], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu2004],
        arch: CpuArch::Arm,
        key: "ubuntu2004",
        releases: &[between([4, 4, 0], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu1804],
        arch: CpuArch::Arm,
        key: "ubuntu1804",
        releases: &[
            between([4, 2, 0], [4, 2, 25]),
            between([4, 4, 0], [4, 4, 29]),
            between([5, 0, 0], [5, 0, 31]),
            between([6, 0, 0], [6, 0, 20]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu1604],
        arch: CpuArch::Arm,
        key: "ubuntu1604",
        releases: &[
            between([3, 4, 0], [3, 4, 24]),
            between([3, 6, 0], [3, 6, 23]),
            between([4, 0, 0], [4, 0, 28]),
            between([4, 2, 0], [4, 2, 25]),
        ],
    },
    // Ubuntu releases running packages built for the previous LTS
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu2204],
        arch: CpuArch::X86,
        key: "ubuntu2004",
        releases: &[
            between([4, 4, 0], [4, 4, 29]),
            between([5, 0, 0], [5, 0, 31]),
            between([6, 0, 0], [6, 0, 3]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Ubuntu2004, OsVersion::Ubuntu2204],
        arch: CpuArch::X86,
        key: "ubuntu1804",
        releases: &[between([4, 0, 1], [4, 0, 28]), between([4, 2, 0], [4, 2, 25])],
    },
    // Debian
    DistroBuild {
        os_versions: &[OsVersion::Debian12],
        arch: CpuArch::X86,
        key: "debian12",
        releases: &[between([7, 0, 3], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Debian11],
        arch: CpuArch::X86,
        key: "debian11",
        releases: &[between([5, 0, 8], [5, 0, 31]), between([6, 0, 0], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Debian10],
        arch: CpuArch::X86,
        key: "debian10",
        releases: &[
            between([4, 2, 1], [4, 2, 25]),
            between([4, 4, 0], [4, 4, 29]),
            between([5, 0, 0], [5, 0, 31]),
            between([6, 0, 0], [6, 0, 20]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Debian9],
        arch: CpuArch::X86,
        key: "debian92",
        releases: &[
            between([3, 6, 5], [3, 6, 23]),
            between([4, 0, 0], [4, 0, 28]),
            between([4, 2, 0], [4, 2, 25]),
            between([4, 4, 0], [4, 4, 29]),
            between([5, 0, 0], [5, 0, 31]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Debian8],
        arch: CpuArch::X86,
        key: "debian81",
        releases: &[
            between([3, 2, 8], [3, 2, 22]),
            between([3, 4, 0], [3, 4, 24]),
            between([3, 6, 0], [3, 6, 23]),
            between([4, 0, 0], [4, 0, 28]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Debian7],
        arch: CpuArch::X86,
        key: "debian71",
        releases: &[
            between([3, 0, 0], [3, 0, 15]),
            between([3, 2, 0], [3, 2, 22]),
            between([3, 4, 0], [3, 4, 24]),
        ],
    },
    DistroBuild {
        os_versions: &[OsVersion::Debian12],
        arch: CpuArch::X86,
        key: "debian11",
        releases: &[between([5, 0, 8], [5, 0, 31]), between([6, 0, 0], [7, 0, 2])],
    },
    // Red Hat and rebuilds
    DistroBuild {
        os_versions: &[OsVersion::Rhel9],
        arch: CpuArch::X86,
        key: "rhel90",
        releases: &[between([6, 0, 4], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Rhel8],
        arch: CpuArch::X86,
        key: "rhel80",
        releases: &[between([4, 0, 14], [4, 0, 28]), between([4, 2, 1], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Rhel7],
        arch: CpuArch::X86,
        key: "rhel70",
        releases: &[between([3, 0, 0], [7, 0, 14])],
    },
    DistroBuild {
        os_versions: &[OsVersion::Rhel6],
        arch: CpuArch::X86,
        key: "rhel62",
        releases: &[between([2, 6, 0], [4, 4, 29])],
    },
    DistroBuild {
        os_versions: &[OsVersion::Rhel9],
        arch: CpuArch::Arm,
        key: "rhel90",
        releases: &[between([6, 0, 7], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Rhel8],
        arch: CpuArch::Arm,
        key: "rhel82",
        releases: &[between([4, 4, 4], LATEST)],
    },
    // Amazon Linux
    DistroBuild {
        os_versions: &[OsVersion::Amazon2023],
        arch: CpuArch::X86,
        key: "amazon2023",
        releases: &[between([7, 0, 0], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Amazon2],
        arch: CpuArch::X86,
        key: "amazon2",
        releases: &[between([4, 0, 0], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Amazon],
        arch: CpuArch::X86,
        key: "amazon",
        releases: &[between([3, 0, 0], [5, 0, 31])],
    },
    DistroBuild {
        os_versions: &[OsVersion::Amazon2023],
        arch: CpuArch::Arm,
        key: "amazon2023",
        releases: &[between([7, 0, 0], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Amazon2],
        arch: CpuArch::Arm,
        key: "amazon2",
        releases: &[between([4, 4, 4], LATEST)],
    },
    // SUSE
    DistroBuild {
        os_versions: &[OsVersion::Suse15],
        arch: CpuArch::X86,
        key: "suse15",
        releases: &[between([4, 2, 1], LATEST)],
    },
    DistroBuild {
        os_versions: &[OsVersion::Suse12],
        arch: CpuArch::X86,
        key: "suse12",
        releases: &[between([3, 2, 0], [6, 0, 20])],
    },
];

fn arch_key(arch: CpuArch) -> &'static str {
    match arch {
        CpuArch::X86 => "x86_64",
        CpuArch::Arm => "aarch64",
    }
}

/// Distribution specific rules, most specific first. Generic builds and the
/// catch-all are appended by the legacy table.
pub(super) fn rules() -> RuleTable {
    BUILDS.iter().fold(RuleTable::new("linux"), |table, build| {
        let arch = arch_key(build.arch);
        let matcher = Match::Arch(build.arch)
            .and(Match::Bits(BitSize::B64))
            .and(Match::os_version_in(build.os_versions.iter().copied()))
            .and(Match::versions(build.releases.iter().copied()));

        table.rule(
            format!("linux-{}-{}", arch, build.key),
            matcher,
            UrlTemplate::tgz(
                Os::Linux,
                format!("linux/mongodb-linux-{}-{}-{{version}}.tgz", arch, build.key),
            ),
        )
    })
}
