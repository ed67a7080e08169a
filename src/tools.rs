//! Canonical registry of bundled third-party tools
//!
//! This module defines every binary the installer ships. When adding or
//! removing a tool, add its builder here and list it in `tool_specs`.

use crate::binding::{KUBECTL, KUBERLR};
use crate::download::checksum::DigestAlgorithm;
use crate::download::context::DownloadContext;
use crate::download::platform::{Arch, OsFamily};
use crate::download::spec::{ArchiveKind, ChecksumSource, ToolSpec};
use crate::error::Result;

const GITHUB: &str = "https://github.com";

/// Build a `ToolSpec` for every bundled tool
///
/// Fails only when an environment-derived destination (the home directory)
/// cannot be resolved.
pub fn tool_specs(ctx: &DownloadContext) -> Result<Vec<ToolSpec>> {
    let mut specs = vec![
        kuberlr(ctx),
        kubectl(ctx)?,
        helm(ctx),
        docker_cli(ctx),
        docker_buildx(ctx),
        docker_compose(ctx),
        ecr_credential_helper(ctx),
        trivy(ctx),
        rancher_dashboard(ctx),
    ];
    specs.extend(docker_credential_helpers(ctx));
    Ok(specs)
}

/// kuberlr, the kubectl version multiplexer that `kubectl` is bound to
pub fn kuberlr(ctx: &DownloadContext) -> ToolSpec {
    let p = &ctx.platform;
    let archive = ArchiveKind::tar_or_zip(p);
    let base = format!("{GITHUB}/flavio/kuberlr/releases/download/v{{version}}");
    let stem = "kuberlr_{version}_{os}_{arch}";

    ToolSpec::binary(
        KUBERLR,
        &ctx.versions.kuberlr,
        format!("{base}/{stem}.{}", archive.extension()),
        ChecksumSource::Manifest {
            url_template: format!("{base}/checksums.txt"),
        },
        ctx.bin_dir.join(p.exe_name(KUBERLR)),
    )
    .with_archive(archive, Some(format!("{stem}/kuberlr{{exe}}")))
    .expand_entry(&ctx.platform)
}

/// kubectl pre-seeded into kuberlr's cache so first use works offline
pub fn kubectl(ctx: &DownloadContext) -> Result<ToolSpec> {
    let p = &ctx.platform;
    let version = &ctx.versions.kubectl;
    let cached_name = p.exe_name(&format!("{KUBECTL}{version}"));

    Ok(ToolSpec::binary(
        KUBECTL,
        version,
        "https://dl.k8s.io/v{version}/bin/{os}/{arch}/kubectl{exe}",
        ChecksumSource::Sidecar { suffix: ".sha256" },
        ctx.kuberlr_cache_dir()?.join(cached_name),
    ))
}

pub fn helm(ctx: &DownloadContext) -> ToolSpec {
    let p = &ctx.platform;
    let archive = ArchiveKind::tar_or_zip(p);

    ToolSpec::binary(
        "helm",
        &ctx.versions.helm,
        format!("https://get.helm.sh/helm-v{{version}}-{{os}}-{{arch}}.{}", archive.extension()),
        ChecksumSource::Sidecar { suffix: ".sha256sum" },
        ctx.bin_dir.join(p.exe_name("helm")),
    )
    .with_archive(archive, Some("{os}-{arch}/helm{exe}".to_string()))
    .expand_entry(&ctx.platform)
}

/// docker CLI, built by the desktop project itself
pub fn docker_cli(ctx: &DownloadContext) -> ToolSpec {
    let base = format!(
        "{GITHUB}/rancher-sandbox/rancher-desktop-docker-cli/releases/download/v{{version}}"
    );

    ToolSpec::binary(
        "docker",
        &ctx.versions.docker_cli,
        format!("{base}/docker-{{os}}-{{arch}}{{exe}}"),
        ChecksumSource::Manifest {
            url_template: format!("{base}/sha256sum.txt"),
        },
        ctx.bin_dir.join(ctx.platform.exe_name("docker")),
    )
}

pub fn docker_buildx(ctx: &DownloadContext) -> ToolSpec {
    let base = format!("{GITHUB}/docker/buildx/releases/download/v{{version}}");

    ToolSpec::binary(
        "docker-buildx",
        &ctx.versions.docker_buildx,
        format!("{base}/buildx-v{{version}}.{{os}}-{{arch}}{{exe}}"),
        ChecksumSource::Manifest {
            url_template: format!("{base}/checksums.txt"),
        },
        ctx.docker_plugins_dir
            .join(ctx.platform.exe_name("docker-buildx")),
    )
}

pub fn docker_compose(ctx: &DownloadContext) -> ToolSpec {
    ToolSpec::binary(
        "docker-compose",
        &ctx.versions.docker_compose,
        format!(
            "{GITHUB}/docker/compose/releases/download/v{{version}}/docker-compose-{{os}}-{{machine}}{{exe}}"
        ),
        ChecksumSource::Sidecar { suffix: ".sha256" },
        ctx.docker_plugins_dir
            .join(ctx.platform.exe_name("docker-compose")),
    )
}

/// Credential helpers available for the platform's native keychains
pub fn credential_helper_names(os: OsFamily) -> &'static [&'static str] {
    match os {
        OsFamily::Linux => &["pass", "secretservice"],
        OsFamily::Darwin => &["osxkeychain", "pass"],
        OsFamily::Windows => &["wincred"],
    }
}

pub fn docker_credential_helpers(ctx: &DownloadContext) -> Vec<ToolSpec> {
    let base = format!("{GITHUB}/docker/docker-credential-helpers/releases/download/v{{version}}");

    credential_helper_names(ctx.platform.os)
        .iter()
        .map(|helper| {
            let name = format!("docker-credential-{helper}");
            ToolSpec::binary(
                &name,
                &ctx.versions.docker_credential_helpers,
                format!("{base}/{name}-v{{version}}.{{os}}-{{arch}}{{exe}}"),
                ChecksumSource::Manifest {
                    url_template: format!("{base}/checksums.txt"),
                },
                ctx.bin_dir.join(ctx.platform.exe_name(&name)),
            )
        })
        .collect()
}

/// Amazon ECR login helper, hosted on S3 rather than GitHub
///
/// The Windows build is published without a `.sha256` sidecar, so it is the
/// one artifact fetched unverified.
pub fn ecr_credential_helper(ctx: &DownloadContext) -> ToolSpec {
    let checksum = if ctx.platform.os.is_windows() {
        ChecksumSource::Unpublished {
            reason: "no checksum is published for the Windows build",
        }
    } else {
        ChecksumSource::Sidecar { suffix: ".sha256" }
    };

    ToolSpec::binary(
        "docker-credential-ecr-login",
        &ctx.versions.ecr_credential_helper,
        "https://amazon-ecr-credential-helper-releases.s3.us-east-2.amazonaws.com/{version}/{os}-{arch}/docker-credential-ecr-login{exe}",
        checksum,
        ctx.bin_dir
            .join(ctx.platform.exe_name("docker-credential-ecr-login")),
    )
}

/// Image scanner; always the Linux build, it runs inside the VM
pub fn trivy(ctx: &DownloadContext) -> ToolSpec {
    let arch = match ctx.platform.arch {
        Arch::Amd64 => "64bit",
        Arch::Arm64 => "ARM64",
    };
    let base = format!("{GITHUB}/aquasecurity/trivy/releases/download/v{{version}}");

    ToolSpec::binary(
        "trivy",
        &ctx.versions.trivy,
        format!("{base}/trivy_{{version}}_Linux-{arch}.tar.gz"),
        ChecksumSource::Manifest {
            url_template: format!("{base}/trivy_{{version}}_checksums.txt"),
        },
        ctx.linux_internal_dir().join("trivy"),
    )
    .with_archive(ArchiveKind::TarGz, Some("trivy".to_string()))
    .with_target(ctx.platform.with_os(OsFamily::Linux))
}

/// Prebuilt dashboard UI, unpacked whole and fetched only once
pub fn rancher_dashboard(ctx: &DownloadContext) -> ToolSpec {
    ToolSpec::binary(
        "rancher-dashboard",
        &ctx.versions.rancher_dashboard,
        format!(
            "{GITHUB}/rancher-sandbox/dashboard/releases/download/desktop-v{{version}}/rancher-dashboard-desktop-embed.tar.gz"
        ),
        ChecksumSource::Sidecar { suffix: ".sha512sum" },
        ctx.resources_dir.join("rancher-dashboard"),
    )
    .with_archive(ArchiveKind::TarGz, None)
    .with_algorithm(DigestAlgorithm::Sha512)
    .skip_if_exists()
}
