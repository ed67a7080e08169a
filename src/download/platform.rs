//! Platform detection and naming for download targets

use once_cell::sync::OnceCell;
use std::fmt;
use std::str::FromStr;

use crate::error::{FetchError, Result};

/// Operating system family the bundle is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    Darwin,
    Windows,
}

impl OsFamily {
    /// Directory name used under the resources root (`linux`, `darwin`, `win32`)
    pub fn resource_name(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Darwin => "darwin",
            OsFamily::Windows => "win32",
        }
    }

    /// OS name as spelled by Kubernetes and most Go release artifacts
    pub fn kube_name(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Darwin => "darwin",
            OsFamily::Windows => "windows",
        }
    }

    pub fn exe_suffix(&self) -> &'static str {
        match self {
            OsFamily::Windows => ".exe",
            OsFamily::Linux | OsFamily::Darwin => "",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, OsFamily::Windows)
    }

    /// Executable file name for `name` on this OS family
    pub fn exe_name(&self, name: &str) -> String {
        format!("{}{}", name, self.exe_suffix())
    }
}

impl FromStr for OsFamily {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "darwin" | "macos" => Ok(OsFamily::Darwin),
            "win32" | "windows" => Ok(OsFamily::Windows),
            other => Err(FetchError::UnsupportedPlatform(format!(
                "unknown OS family '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// CPU architecture the bundle is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    /// Go/Kubernetes spelling (`amd64`, `arm64`)
    pub fn kube_name(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }

    /// `uname -m` spelling (`x86_64`, `aarch64`)
    pub fn machine_name(&self) -> &'static str {
        match self {
            Arch::Amd64 => "x86_64",
            Arch::Arm64 => "aarch64",
        }
    }
}

impl FromStr for Arch {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            other => Err(FetchError::UnsupportedPlatform(format!(
                "unknown architecture '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kube_name())
    }
}

/// Target platform for a fetch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: OsFamily,
    pub arch: Arch,
}

/// Host platform, detected once
static HOST_PLATFORM: OnceCell<Platform> = OnceCell::new();

impl Platform {
    pub fn new(os: OsFamily, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the host platform (cached after first call)
    pub fn detect() -> Result<Self> {
        HOST_PLATFORM
            .get_or_try_init(|| Self::from_consts(std::env::consts::OS, std::env::consts::ARCH))
            .copied()
    }

    fn from_consts(os: &str, arch: &str) -> Result<Self> {
        let os = match os {
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::Darwin,
            "windows" => OsFamily::Windows,
            other => {
                return Err(FetchError::UnsupportedPlatform(format!(
                    "host OS '{}' is not a bundle target",
                    other
                )));
            }
        };
        Ok(Self::new(os, arch.parse()?))
    }

    /// Same architecture, different OS family
    pub fn with_os(&self, os: OsFamily) -> Self {
        Self::new(os, self.arch)
    }

    pub fn exe_name(&self, name: &str) -> String {
        self.os.exe_name(name)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.kube_name(), self.arch.kube_name())
    }
}
