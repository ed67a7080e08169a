use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment override for the download inactivity timeout (seconds)
pub const INACTIVITY_TIMEOUT_ENV: &str = "BUNDLE_DEPS_INACTIVITY_TIMEOUT";

/// Top‑level fetcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub versions: DependencyVersions,
    pub http: HttpConfig,
}

/// Version pins for every bundled tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyVersions {
    pub kuberlr: String,
    /// Kubernetes release whose kubectl is pre-seeded into the kuberlr cache
    pub kubectl: String,
    pub helm: String,
    pub docker_cli: String,
    pub docker_buildx: String,
    pub docker_compose: String,
    pub docker_credential_helpers: String,
    pub ecr_credential_helper: String,
    pub trivy: String,
    pub rancher_dashboard: String,
}

impl Default for DependencyVersions {
    fn default() -> Self {
        Self {
            kuberlr: "0.6.1".into(),
            kubectl: "1.32.2".into(),
            helm: "3.17.1".into(),
            docker_cli: "27.5.1".into(),
            docker_buildx: "0.21.1".into(),
            docker_compose: "2.33.1".into(),
            docker_credential_helpers: "0.9.2".into(),
            ecr_credential_helper: "0.9.1".into(),
            trivy: "0.59.1".into(),
            rancher_dashboard: "2.11.1.rd1".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Abort a download when no bytes arrive for this long
    pub inactivity_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            inactivity_timeout_secs: 300,
            user_agent: concat!("bundle-deps/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Inactivity timeout, overridable through `BUNDLE_DEPS_INACTIVITY_TIMEOUT`
    pub fn inactivity_timeout(&self) -> Duration {
        std::env::var(INACTIVITY_TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(self.inactivity_timeout_secs))
    }
}

impl FetcherConfig {
    /// Load configuration from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::debug!("No config file given, using built-in version pins");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: FetcherConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        log::info!("Using config from: {}", path.display());
        Ok(cfg)
    }

    /// Write the default configuration to `path`, creating parent directories
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let default_toml = toml::to_string_pretty(&FetcherConfig::default())
            .context("Failed to serialize default config")?;
        std::fs::write(path, default_toml).context("Failed to write config file")?;

        Ok(())
    }
}
