//! Resolved target and destination layout for a fetch run

use std::path::{Path, PathBuf};

use super::platform::Platform;
use crate::config::{DependencyVersions, FetcherConfig, HttpConfig};
use crate::error::{FetchError, Result};

/// Everything a fetch run needs to know about where tools go
///
/// Layout under `resources_dir`:
/// - `<os>/bin` user-facing executables
/// - `<os>/internal` backend-only executables
/// - `<os>/docker-cli-plugins` docker CLI plugins
#[derive(Debug, Clone)]
pub struct DownloadContext {
    pub platform: Platform,
    pub versions: DependencyVersions,
    pub http: HttpConfig,
    pub resources_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub internal_dir: PathBuf,
    pub docker_plugins_dir: PathBuf,
    /// `None` when the home directory cannot be resolved
    pub home_dir: Option<PathBuf>,
}

impl DownloadContext {
    pub fn new(platform: Platform, config: FetcherConfig, resources_dir: impl AsRef<Path>) -> Self {
        let resources_dir = resources_dir.as_ref().to_path_buf();
        let platform_dir = resources_dir.join(platform.os.resource_name());

        Self {
            platform,
            versions: config.versions,
            http: config.http,
            bin_dir: platform_dir.join("bin"),
            internal_dir: platform_dir.join("internal"),
            docker_plugins_dir: platform_dir.join("docker-cli-plugins"),
            resources_dir,
            home_dir: dirs::home_dir(),
        }
    }

    /// Override the home directory (used for the kuberlr cache)
    pub fn with_home_dir(mut self, home: Option<PathBuf>) -> Self {
        self.home_dir = home;
        self
    }

    /// Create the per-platform directories every run writes into
    pub async fn create_layout(&self) -> Result<()> {
        for dir in [&self.bin_dir, &self.internal_dir, &self.docker_plugins_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Internal directory of the Linux VM image, whatever the host platform
    pub fn linux_internal_dir(&self) -> PathBuf {
        self.resources_dir.join("linux").join("internal")
    }

    /// kuberlr's per-platform kubectl cache: `~/.kuberlr/<os>-<arch>`
    pub fn kuberlr_cache_dir(&self) -> Result<PathBuf> {
        let home = self.home_dir.as_ref().ok_or_else(|| {
            FetchError::MissingEnvironment(
                "could not determine home directory for the kuberlr cache".to_string(),
            )
        })?;

        Ok(home.join(".kuberlr").join(format!(
            "{}-{}",
            self.platform.os.kube_name(),
            self.platform.arch.kube_name()
        )))
    }
}
