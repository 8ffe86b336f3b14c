//! Host detection and the platform/architecture decision matrix.
//!
//! Every later build step takes a [`Target`], which can only be produced by
//! [`resolve_target`] for a supported host. Nothing downstream re-reads the host.

use thiserror::Error;

/// Operating system of the machine running strata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Darwin,
    Windows,
    Other(String),
}

impl HostOs {
    /// Map a `std::env::consts::OS` style name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "linux" => Self::Linux,
            "macos" => Self::Darwin,
            "windows" => Self::Windows,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }
}

/// CPU architecture. Anything that is not ARM is treated as `x86_64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Arm64,
}

impl Arch {
    /// Classify a machine string (`x86_64`, `aarch64`, `arm64`, `armv7l`, ...).
    pub fn from_machine(machine: &str) -> Self {
        let machine = machine.to_ascii_lowercase();
        if machine.contains("arm") || machine.contains("aarch") {
            Self::Arm64
        } else {
            Self::X86_64
        }
    }

    pub fn current() -> Self {
        Self::from_machine(std::env::consts::ARCH)
    }

    pub fn is_arm(self) -> bool {
        self == Self::Arm64
    }

    /// The architecture a cross build produces from this one.
    pub fn flipped(self) -> Self {
        match self {
            Self::X86_64 => Self::Arm64,
            Self::Arm64 => Self::X86_64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub os: HostOs,
    pub arch: Arch,
}

impl Host {
    pub fn new(os: HostOs, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn detect() -> Self {
        Self::new(HostOs::current(), Arch::current())
    }

    pub fn is_linux_arm(&self) -> bool {
        self.os == HostOs::Linux && self.arch.is_arm()
    }
}

/// Operating systems a build can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Linux,
    Darwin,
}

/// Reasons a host/option combination is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Windows not supported yet")]
    Windows,
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),
    #[error("stanc3 not available for Mac ARM yet")]
    MacArm,
    #[error("Cannot cross-compile on ARM yet")]
    CrossCompileOnArm,
}

/// What the build produces, derived once from the host and the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub os: TargetOs,
    pub arch: Arch,
    pub cross: bool,
}

/// Apply the decision matrix to a host.
pub fn resolve_target(host: &Host, cross_compile: bool) -> Result<Target, PlatformError> {
    let os = match &host.os {
        HostOs::Linux => TargetOs::Linux,
        HostOs::Darwin => TargetOs::Darwin,
        HostOs::Windows => return Err(PlatformError::Windows),
        HostOs::Other(name) => return Err(PlatformError::UnsupportedOs(name.clone())),
    };

    if os == TargetOs::Darwin && host.arch.is_arm() {
        return Err(PlatformError::MacArm);
    }

    if cross_compile && host.arch.is_arm() {
        return Err(PlatformError::CrossCompileOnArm);
    }

    let arch = if cross_compile {
        host.arch.flipped()
    } else {
        host.arch
    };

    Ok(Target {
        os,
        arch,
        cross: cross_compile,
    })
}

const DARWIN_CROSS_CC: &str = "gcc -target arm64-apple-macos11";
const DARWIN_CROSS_CXX: &str = "g++ -target arm64-apple-macos11";
pub const LINUX_CROSS_CC: &str = "aarch64-linux-gnu-gcc";
pub const LINUX_CROSS_CXX: &str = "aarch64-linux-gnu-g++";
const LINUX_CROSS_STRIP: &str = "aarch64-linux-gnu-strip";

impl Target {
    pub fn is_arm(&self) -> bool {
        self.arch.is_arm()
    }

    /// Default `MACOSX_DEPLOYMENT_TARGET` for Darwin builds.
    pub fn deployment_target(&self) -> Option<&'static str> {
        match self.os {
            TargetOs::Darwin if self.is_arm() => Some("11"),
            TargetOs::Darwin => Some("10.14"),
            TargetOs::Linux => None,
        }
    }

    /// C and C++ compilers overriding the toolchain defaults, for cross builds only.
    pub fn compilers(&self) -> Option<(&'static str, &'static str)> {
        if !self.cross {
            return None;
        }
        Some(match self.os {
            TargetOs::Darwin => (DARWIN_CROSS_CC, DARWIN_CROSS_CXX),
            TargetOs::Linux => (LINUX_CROSS_CC, LINUX_CROSS_CXX),
        })
    }

    /// `arch=` value understood by the TBB makefiles, for cross builds only.
    pub fn tbb_arch(&self) -> Option<&'static str> {
        if !self.cross {
            return None;
        }
        Some(match self.os {
            TargetOs::Darwin => "arm64",
            TargetOs::Linux => "aarch64",
        })
    }

    /// `OS=` value passed to the cmdstan makefiles.
    pub fn make_os(&self) -> &'static str {
        match self.os {
            TargetOs::Darwin => "Darwin",
            TargetOs::Linux => "Linux",
        }
    }

    pub fn strip_tool(&self) -> &'static str {
        if self.cross {
            LINUX_CROSS_STRIP
        } else {
            "strip"
        }
    }

    /// Whether a file in the TBB build directory is a shared library to ship.
    pub fn is_shared_lib(&self, file_name: &str) -> bool {
        match self.os {
            TargetOs::Darwin => file_name.ends_with(".dylib"),
            TargetOs::Linux => file_name.contains(".so"),
        }
    }
}

/// Extra environment applied on top of the inherited one for every build command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: Vec<(String, String)>,
}

impl BuildEnv {
    /// `inherited_deployment_target` is the caller's `MACOSX_DEPLOYMENT_TARGET`, which wins.
    pub fn for_target(target: &Target, inherited_deployment_target: Option<&str>) -> Self {
        let mut vars = Vec::new();
        if let Some(default) = target.deployment_target() {
            if inherited_deployment_target.is_none() {
                vars.push(("MACOSX_DEPLOYMENT_TARGET".to_string(), default.to_string()));
            }
        }
        Self { vars }
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
