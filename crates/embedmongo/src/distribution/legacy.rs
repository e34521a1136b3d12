//! Generic unlabeled builds and the OSes MongoDB stopped (or never started) building for

use super::matcher::Match;
use super::rules::{RuleTable, UrlTemplate};
use super::v;
use crate::platform::{BitSize, CpuArch, Os};

/// Generic Linux builds, tried after every distribution specific rule
pub(super) fn linux_rules() -> RuleTable {
    RuleTable::new("linux-legacy")
        .rule(
            "linux-i686",
            Match::Arch(CpuArch::X86)
                .and(Match::Bits(BitSize::B32))
                .and(Match::version_between(v(2, 6, 0), v(3, 2, 22))),
            UrlTemplate::tgz(Os::Linux, "linux/mongodb-linux-i686-{version}.tgz"),
        )
        .reject(
            "32-bit Linux builds are not published after 3.2",
            Match::Bits(BitSize::B32),
        )
        .reject(
            "ARM builds only exist for specific distributions, set an OS version",
            Match::Arch(CpuArch::Arm),
        )
        .rule(
            "linux-x86_64",
            Match::version_between(v(2, 6, 0), v(4, 0, 28)),
            UrlTemplate::tgz(Os::Linux, "linux/mongodb-linux-x86_64-{version}.tgz"),
        )
        .otherwise_reject(
            "generic Linux builds end at 4.0, set a supported distribution as OS version",
        )
}

pub(super) fn solaris_rules() -> RuleTable {
    RuleTable::new("solaris")
        .rule(
            "sunos5-x86_64",
            Match::Arch(CpuArch::X86)
                .and(Match::Bits(BitSize::B64))
                .and(Match::version_between(v(2, 6, 0), v(3, 4, 24))),
            UrlTemplate::tgz(Os::Solaris, "sunos5/mongodb-sunos5-x86_64-{version}.tgz"),
        )
        .otherwise_reject("Solaris builds are only published for 64-bit x86 up to 3.4")
}

pub(super) fn freebsd_rules() -> RuleTable {
    RuleTable::new("freebsd").otherwise_reject("MongoDB publishes no FreeBSD builds")
}
