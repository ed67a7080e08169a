//! Static description of one downloadable tool

use std::path::PathBuf;

use super::checksum::DigestAlgorithm;
use super::platform::Platform;
use crate::error::{FetchError, Result};

/// How the downloaded artifact is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// The download is the executable itself
    None,
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Archive kind matching the platform's release convention (zip on Windows)
    pub fn tar_or_zip(platform: &Platform) -> Self {
        if platform.os.is_windows() {
            ArchiveKind::Zip
        } else {
            ArchiveKind::TarGz
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::None => "",
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
        }
    }
}

/// Where the expected digest comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumSource {
    /// Digest pinned in the tool registry
    Inline(String),
    /// File at `<download url><suffix>` holding the digest
    Sidecar { suffix: &'static str },
    /// Release-wide manifest, filtered by the download's file name
    Manifest { url_template: String },
    /// Publisher ships no checksum for this artifact
    Unpublished { reason: &'static str },
}

/// One third-party binary and how to fetch, verify and place it
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub version: String,
    pub url_template: String,
    pub archive: ArchiveKind,
    /// Path inside the archive; `None` unpacks the whole archive
    pub entry: Option<String>,
    pub checksum: ChecksumSource,
    pub algorithm: DigestAlgorithm,
    /// Final file (single binary) or directory (whole archive)
    pub destination: PathBuf,
    /// Skip the fetch entirely when `destination` already exists
    pub skip_if_exists: bool,
    /// Fixed platform for tools that only ever run inside the Linux VM
    pub target: Option<Platform>,
}

impl ToolSpec {
    /// A single executable downloaded as-is, verified with SHA-256
    pub fn binary(
        name: impl Into<String>,
        version: impl Into<String>,
        url_template: impl Into<String>,
        checksum: ChecksumSource,
        destination: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url_template: url_template.into(),
            archive: ArchiveKind::None,
            entry: None,
            checksum,
            algorithm: DigestAlgorithm::Sha256,
            destination,
            skip_if_exists: false,
            target: None,
        }
    }

    /// Extract `entry` out of an archive
    pub fn with_archive(mut self, archive: ArchiveKind, entry: Option<String>) -> Self {
        self.archive = archive;
        self.entry = entry;
        self
    }

    /// Expand placeholders in the archive entry path
    pub fn expand_entry(mut self, run: &Platform) -> Self {
        let platform = self.platform_for(run);
        if let Some(entry) = self.entry.take() {
            self.entry = Some(expand_template(&entry, &self.version, &platform));
        }
        self
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn skip_if_exists(mut self) -> Self {
        self.skip_if_exists = true;
        self
    }

    pub fn with_target(mut self, platform: Platform) -> Self {
        self.target = Some(platform);
        self
    }

    /// Platform this spec resolves against: its fixed target, else the run's
    pub fn platform_for(&self, run: &Platform) -> Platform {
        self.target.unwrap_or(*run)
    }

    /// Expand a template against this spec's version and platform
    pub fn expand(&self, template: &str, run: &Platform) -> String {
        expand_template(template, &self.version, &self.platform_for(run))
    }

    /// Download URL with version and platform substituted
    pub fn resolved_url(&self, platform: &Platform) -> String {
        self.expand(&self.url_template, platform)
    }
}

/// Expand `{version}`, `{os}`, `{arch}`, `{machine}` and `{exe}` in a template
pub fn expand_template(template: &str, version: &str, platform: &Platform) -> String {
    template
        .replace("{version}", version)
        .replace("{os}", platform.os.kube_name())
        .replace("{arch}", platform.arch.kube_name())
        .replace("{machine}", platform.arch.machine_name())
        .replace("{exe}", platform.os.exe_suffix())
}

/// Last path segment of a download URL
pub fn url_file_name(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FetchError::InvalidUrl {
            url: raw.to_string(),
            message: "URL has no file name".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::platform::{Arch, OsFamily};

    #[test]
    fn expands_all_placeholders() {
        let platform = Platform::new(OsFamily::Windows, Arch::Arm64);
        assert_eq!(
            expand_template(
                "https://x/v{version}/tool-{os}-{arch}-{machine}{exe}",
                "1.2.3",
                &platform
            ),
            "https://x/v1.2.3/tool-windows-arm64-aarch64.exe"
        );
    }

    #[test]
    fn unix_exe_placeholder_is_empty() {
        let platform = Platform::new(OsFamily::Darwin, Arch::Amd64);
        assert_eq!(
            expand_template("kubectl{exe}", "1.0.0", &platform),
            "kubectl"
        );
    }

    #[test]
    fn resolves_manifest_url() {
        let platform = Platform::new(OsFamily::Linux, Arch::Amd64);
        let spec = ToolSpec::binary(
            "docker",
            "27.0.0",
            "https://x/v{version}/docker-{os}-{arch}",
            ChecksumSource::Manifest {
                url_template: "https://x/v{version}/sha256sum.txt".to_string(),
            },
            PathBuf::from("/tmp/docker"),
        );
        assert_eq!(spec.resolved_url(&platform), "https://x/v27.0.0/docker-linux-amd64");
        let ChecksumSource::Manifest { url_template } = &spec.checksum else {
            panic!("docker should use a manifest");
        };
        assert_eq!(
            spec.expand(url_template, &platform),
            "https://x/v27.0.0/sha256sum.txt"
        );
    }

    #[test]
    fn fixed_target_overrides_run_platform() {
        let mac = Platform::new(OsFamily::Darwin, Arch::Arm64);
        let spec = ToolSpec::binary(
            "trivy",
            "0.1.0",
            "https://x/trivy-{os}-{arch}{exe}",
            ChecksumSource::Inline("00".into()),
            PathBuf::from("/tmp/trivy"),
        )
        .with_target(mac.with_os(OsFamily::Linux));

        assert_eq!(spec.resolved_url(&mac), "https://x/trivy-linux-arm64");
    }

    #[test]
    fn file_name_from_url() {
        assert_eq!(
            url_file_name("https://get.helm.sh/helm-v3.0.0-linux-amd64.tar.gz").unwrap(),
            "helm-v3.0.0-linux-amd64.tar.gz"
        );
        assert!(url_file_name("https://get.helm.sh/").is_err());
        assert!(url_file_name("not a url").is_err());
    }

    #[test]
    fn archive_kind_follows_platform() {
        let win = Platform::new(OsFamily::Windows, Arch::Amd64);
        let mac = Platform::new(OsFamily::Darwin, Arch::Arm64);
        assert_eq!(ArchiveKind::tar_or_zip(&win), ArchiveKind::Zip);
        assert_eq!(ArchiveKind::tar_or_zip(&mac), ArchiveKind::TarGz);
    }
}
