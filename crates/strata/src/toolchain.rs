//! Pinned cmdstan release and the on-disk workspace layout.
//!
//! When upgrading, check the CLI11 and rapidjson licenses bundled in `licenses/`.

use crate::platform::Host;
use std::path::{Path, PathBuf};

pub const CMDSTAN_VERSION: &str = "2.30.0";

const RELEASES_URL: &str = "https://github.com/stan-dev/cmdstan/releases/download";
const GENERIC_SHA256: &str = "009c2ea0043aa4a91c03ac78932e64f3cff4faa3e73413a2e0269d5be2d8de6c";
const LINUX_ARM64_SHA256: &str = "8ab1eaa83af100336e31fed1bcb854f30e7f775feb1274552fc706ed177969ef";

/// TBB source directory, relative to the cmdstan tree.
const TBB_DIR: &str = "stan/lib/stan_math/lib/tbb_2020.3";

/// A release archive and its expected sha256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub url: String,
    pub sha256: String,
}

impl Archive {
    /// The archive for a host. The Linux ARM build differs only in stanc.
    pub fn for_host(host: &Host) -> Self {
        let (name, sha256) = if host.is_linux_arm() {
            (
                format!("cmdstan-{CMDSTAN_VERSION}-linux-arm64.tar.gz"),
                LINUX_ARM64_SHA256,
            )
        } else {
            (format!("cmdstan-{CMDSTAN_VERSION}.tar.gz"), GENERIC_SHA256)
        };

        Self {
            url: format!("{RELEASES_URL}/v{CMDSTAN_VERSION}/{name}"),
            sha256: sha256.to_string(),
        }
    }

    /// Same checksum, different location (mirrors).
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Name of the TBB build directory for a build flavour.
pub fn tbb_target_name(cross: bool, static_link: bool) -> String {
    let mut name = String::from("strata-tbb");
    if cross {
        name.push_str("-cc");
    }
    if static_link {
        name.push_str("-static");
    }
    name
}

/// Paths inside the shared workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub workspace: PathBuf,
    pub cmdstan: PathBuf,
    pub tbb: PathBuf,
    pub tbb_lib: PathBuf,
}

impl Layout {
    pub fn new(workspace: &Path, tbb_target: &str) -> Self {
        let cmdstan = workspace.join(format!("cmdstan-{CMDSTAN_VERSION}"));
        let tbb = cmdstan.join(TBB_DIR);
        let tbb_lib = cmdstan.join(TBB_DIR).with_file_name(tbb_target);
        Self {
            workspace: workspace.to_path_buf(),
            cmdstan,
            tbb,
            tbb_lib,
        }
    }

    /// Last object file the toolchain produces; its architecture tells whether
    /// the tree was built for the current target.
    pub fn main_object(&self) -> PathBuf {
        self.cmdstan.join("src/cmdstan/main.o")
    }

    pub fn source_path(&self, source: &LicenseSource) -> Option<PathBuf> {
        match source {
            LicenseSource::Cmdstan(rel) => Some(self.cmdstan.join(rel)),
            LicenseSource::Tbb(rel) => Some(self.tbb.join(rel)),
            LicenseSource::Bundled(_) => None,
        }
    }
}

/// Where a shipped license file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseSource {
    /// Path relative to the cmdstan tree.
    Cmdstan(&'static str),
    /// Path relative to the TBB source tree.
    Tbb(&'static str),
    /// Text compiled into strata, for header-only dependencies without a license file in the tree.
    Bundled(&'static str),
}

/// License files copied into `<output>/licenses/`.
pub const LICENSES: &[(LicenseSource, &str)] = &[
    (LicenseSource::Cmdstan("LICENSE"), "cmdstan-license.txt"),
    (LicenseSource::Cmdstan("stan/LICENSE.md"), "stan-license.txt"),
    (
        LicenseSource::Cmdstan("stan/lib/stan_math/LICENSE.md"),
        "stan-math-license.txt",
    ),
    (
        LicenseSource::Cmdstan("stan/lib/stan_math/lib/boost_1.78.0/LICENSE_1_0.txt"),
        "boost-license.txt",
    ),
    (
        LicenseSource::Cmdstan("stan/lib/stan_math/lib/sundials_6.1.1/LICENSE"),
        "sundials-license.txt",
    ),
    (
        LicenseSource::Cmdstan("stan/lib/stan_math/lib/sundials_6.1.1/NOTICE"),
        "sundials-notice.txt",
    ),
    (
        LicenseSource::Cmdstan("stan/lib/stan_math/lib/eigen_3.3.9/COPYING.MPL2"),
        "eigen-mpl2-license.txt",
    ),
    (
        LicenseSource::Cmdstan("stan/lib/stan_math/lib/eigen_3.3.9/COPYING.BSD"),
        "eigen-bsd-license.txt",
    ),
    (LicenseSource::Tbb("LICENSE"), "tbb-license.txt"),
    (
        LicenseSource::Tbb("third-party-programs.txt"),
        "tbb-third-party-programs.txt",
    ),
    (
        LicenseSource::Bundled(include_str!("../licenses/cli11-license.txt")),
        "cli11-license.txt",
    ),
    (
        LicenseSource::Bundled(include_str!("../licenses/rapidjson-license.txt")),
        "rapidjson-license.txt",
    ),
];
