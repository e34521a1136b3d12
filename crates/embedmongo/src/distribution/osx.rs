//! macOS builds

use super::matcher::Match;
use super::rules::{RuleTable, UrlTemplate};
use super::v;
use crate::platform::{BitSize, CpuArch, Os};

pub(super) fn rules() -> RuleTable {
    RuleTable::new("osx")
        .reject("no 32-bit macOS builds", Match::Bits(BitSize::B32))
        .rule(
            "macos-arm64",
            Match::Arch(CpuArch::Arm).and(Match::version_from(v(6, 0, 0))),
            UrlTemplate::tgz(Os::OsX, "osx/mongodb-macos-arm64-{version}.tgz"),
        )
        .reject(
            "Apple silicon builds are published from 6.0 on",
            Match::Arch(CpuArch::Arm),
        )
        .rule(
            "macos-x86_64",
            Match::version_from(v(4, 2, 0)),
            UrlTemplate::tgz(Os::OsX, "osx/mongodb-macos-x86_64-{version}.tgz"),
        )
        .rule(
            "osx-ssl-x86_64",
            Match::version_between(v(3, 2, 0), v(4, 0, 28)),
            UrlTemplate::tgz(Os::OsX, "osx/mongodb-osx-ssl-x86_64-{version}.tgz"),
        )
        .rule(
            "osx-x86_64",
            Match::version_between(v(2, 6, 0), v(3, 0, 15)),
            UrlTemplate::tgz(Os::OsX, "osx/mongodb-osx-x86_64-{version}.tgz"),
        )
        .otherwise_reject("no macOS package published for this version")
}
