//! Tool fetch orchestration

use futures::future::try_join_all;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::checksum::{find_checksum, parse_sidecar, verify};
use super::context::DownloadContext;
use super::extract::{extract_archive, set_executable};
use super::http::HttpClient;
use super::platform::Platform;
use super::spec::{ArchiveKind, ChecksumSource, ToolSpec, url_file_name};
use crate::binding::{KUBECTL, bind_kubectl};
use crate::error::{FetchError, Result};
use crate::progress::{FetchPhase, FetchProgress, ProgressSender};
use crate::tools::tool_specs;

/// Resolve the published digest for a download
///
/// Returns `None` only for the documented unpublished-checksum exception.
pub async fn resolve_checksum(
    client: &HttpClient,
    spec: &ToolSpec,
    platform: &Platform,
    download_url: &str,
) -> Result<Option<String>> {
    match &spec.checksum {
        ChecksumSource::Inline(digest) => Ok(Some(digest.clone())),
        ChecksumSource::Sidecar { suffix } => {
            let sidecar_url = format!("{}{}", download_url, suffix);
            let contents = client.fetch_text(&sidecar_url).await?;
            parse_sidecar(&contents, &sidecar_url).map(Some)
        }
        ChecksumSource::Manifest { url_template } => {
            let manifest_url = spec.expand(url_template, platform);
            let file_name = url_file_name(download_url)?;
            let manifest = client.fetch_text(&manifest_url).await?;
            find_checksum(&manifest, &file_name, &manifest_url).map(Some)
        }
        ChecksumSource::Unpublished { reason } => {
            warn!(
                "Skipping checksum verification for {} {}: {}",
                spec.name, spec.version, reason
            );
            Ok(None)
        }
    }
}

/// Copy a verified plain download to its destination
async fn place_binary(downloaded: &Path, destination: &Path) -> Result<PathBuf> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Temp dir may sit on another filesystem, so copy rather than rename
    tokio::fs::copy(downloaded, destination).await?;
    set_executable(destination)?;
    Ok(destination.to_path_buf())
}

/// Fetch, verify and place a single tool
pub async fn fetch_one(
    client: &HttpClient,
    spec: &ToolSpec,
    platform: &Platform,
    progress: &ProgressSender,
) -> Result<PathBuf> {
    if spec.skip_if_exists && tokio::fs::try_exists(&spec.destination).await? {
        info!(
            "{} already present at {}, skipping",
            spec.name,
            spec.destination.display()
        );
        progress.send(FetchProgress::new(&spec.name, FetchPhase::Skipped));
        return Ok(spec.destination.clone());
    }

    let url = spec.resolved_url(platform);
    let file_name = url_file_name(&url)?;

    // Phase 1: expected digest
    progress.send(FetchProgress::new(&spec.name, FetchPhase::Resolving));
    let expected = resolve_checksum(client, spec, platform, &url).await?;
    if let Some(expected) = &expected {
        debug!("{} expects {} {}", spec.name, spec.algorithm.name(), expected);
    }

    // Phase 2: download into a guard-owned temp dir
    info!("Downloading {} {} from {}", spec.name, spec.version, url);
    let temp_dir = tempfile::tempdir()?;
    let download_path = temp_dir.path().join(&file_name);
    let downloaded = client
        .download_to(&spec.name, &url, &download_path, spec.algorithm, progress)
        .await?;

    // Phase 3: integrity
    progress.send(FetchProgress::new(&spec.name, FetchPhase::Verifying));
    if let Some(expected) = &expected {
        verify(&spec.name, expected, &downloaded.digest)?;
    }

    // Phase 4: placement
    progress.send(FetchProgress::new(&spec.name, FetchPhase::Extracting));
    let placed = match spec.archive {
        ArchiveKind::None => place_binary(&download_path, &spec.destination).await?,
        kind => {
            extract_archive(&download_path, kind, spec.entry.as_deref(), &spec.destination).await?
        }
    };

    info!(
        "Fetched {} {} ({} bytes) to {}",
        spec.name,
        spec.version,
        downloaded.bytes,
        placed.display()
    );
    progress.send(FetchProgress::new(&spec.name, FetchPhase::Complete));

    Ok(placed)
}

/// Fetch `specs` concurrently, then bind `kubectl` to `kuberlr` in `bin_dir`
///
/// The first failure fails the whole run, wrapped with the tool's name; the
/// remaining fetches are dropped and no partial result is returned.
pub async fn fetch_specs(
    client: &HttpClient,
    specs: &[ToolSpec],
    platform: &Platform,
    bin_dir: &Path,
    progress: &ProgressSender,
) -> Result<Vec<PathBuf>> {
    let fetches = specs.iter().map(|spec| async move {
        fetch_one(client, spec, platform, progress)
            .await
            .map_err(|e| FetchError::for_tool(&spec.name, e))
    });

    let mut placed = try_join_all(fetches).await?;

    let kubectl =
        bind_kubectl(bin_dir, platform).map_err(|e| FetchError::for_tool(KUBECTL, e))?;
    placed.push(kubectl);

    Ok(placed)
}

/// Fetch every bundled tool for `context`
pub async fn fetch_all(context: &DownloadContext, progress: ProgressSender) -> Result<Vec<PathBuf>> {
    let specs = tool_specs(context)?;
    let client = HttpClient::new(&context.http)?;

    info!(
        "Fetching {} tools for {} into {}",
        specs.len(),
        context.platform,
        context.resources_dir.display()
    );
    context.create_layout().await?;

    fetch_specs(&client, &specs, &context.platform, &context.bin_dir, &progress).await
}
