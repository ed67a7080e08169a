//! Exposing one downloaded tool under an alias name
//!
//! `kubectl` is never shipped directly: the bundle carries `kuberlr`, which
//! picks a kubectl matching the cluster version, and `kubectl` is bound to
//! it. Windows gets a copy; everything else gets a relative symlink.

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::download::extract::set_executable;
use crate::download::platform::Platform;
use crate::error::Result;

pub const KUBECTL: &str = "kubectl";
pub const KUBERLR: &str = "kuberlr";

/// How an alias is bound to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStrategy {
    Copy,
    Symlink,
}

impl BindStrategy {
    pub fn for_platform(platform: &Platform) -> Self {
        if platform.os.is_windows() {
            BindStrategy::Copy
        } else {
            BindStrategy::Symlink
        }
    }
}

/// Bind `alias` to `target` inside `dir`
///
/// Symlinks point at the bare target name so the directory stays relocatable.
/// A link found pointing anywhere else (or a plain file in its place) is
/// deleted and recreated.
pub fn bind_alias(dir: &Path, target: &str, alias: &str, strategy: BindStrategy) -> Result<PathBuf> {
    let target_path = dir.join(target);
    let alias_path = dir.join(alias);

    match strategy {
        BindStrategy::Copy => {
            fs::copy(&target_path, &alias_path)?;
            set_executable(&alias_path)?;
            info!("Copied {} to {}", target_path.display(), alias_path.display());
        }
        BindStrategy::Symlink => {
            if let Ok(meta) = fs::symlink_metadata(&alias_path) {
                if meta.file_type().is_symlink() {
                    let current = fs::read_link(&alias_path)?;
                    if current == Path::new(target) {
                        debug!("{} already links to {}", alias_path.display(), target);
                        return Ok(alias_path);
                    }
                    info!(
                        "Repairing {}: points to {}, expected {}",
                        alias_path.display(),
                        current.display(),
                        target
                    );
                } else {
                    info!("Replacing {} with a link to {}", alias_path.display(), target);
                }
                fs::remove_file(&alias_path)?;
            }

            symlink(Path::new(target), &alias_path)?;
            info!("Linked {} -> {}", alias_path.display(), target);
        }
    }

    Ok(alias_path)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Bind `kubectl` to `kuberlr` in the user-facing bin directory
pub fn bind_kubectl(bin_dir: &Path, platform: &Platform) -> Result<PathBuf> {
    bind_alias(
        bin_dir,
        &platform.exe_name(KUBERLR),
        &platform.exe_name(KUBECTL),
        BindStrategy::for_platform(platform),
    )
}
