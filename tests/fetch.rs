//! End-to-end fetches against a local release host

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use bundle_deps::FetchError;
use bundle_deps::config::HttpConfig;
use bundle_deps::download::checksum::DigestAlgorithm;
use bundle_deps::download::{
    Arch, ArchiveKind, ChecksumSource, HttpClient, OsFamily, Platform, ToolSpec, fetch_one,
    fetch_specs,
};
use bundle_deps::progress::{FetchPhase, ProgressSender};

/// Files served by path, plus a request counter
#[derive(Default)]
struct Fixtures {
    files: HashMap<String, Vec<u8>>,
    hits: AtomicUsize,
}

async fn serve(State(fixtures): State<Arc<Fixtures>>, uri: Uri) -> Response {
    fixtures.hits.fetch_add(1, Ordering::SeqCst);
    match fixtures.files.get(uri.path()) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

struct ReleaseHost {
    base: String,
    fixtures: Arc<Fixtures>,
}

impl ReleaseHost {
    async fn start(files: Vec<(&str, Vec<u8>)>) -> Self {
        let fixtures = Arc::new(Fixtures {
            files: files
                .into_iter()
                .map(|(path, body)| (path.to_string(), body))
                .collect(),
            hits: AtomicUsize::new(0),
        });

        let app = Router::new().fallback(serve).with_state(fixtures.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            fixtures,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn hits(&self) -> usize {
        self.fixtures.hits.load(Ordering::SeqCst)
    }
}

/// Host that reads each request, writes `reply`, then never sends another byte
async fn silent_host(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn sha512_hex(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn linux() -> Platform {
    Platform::new(OsFamily::Linux, Arch::Amd64)
}

fn client() -> HttpClient {
    HttpClient::new(&HttpConfig::default()).unwrap()
}

#[cfg(unix)]
fn assert_executable(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[cfg(not(unix))]
fn assert_executable(_path: &std::path::Path) {}

#[tokio::test]
async fn manifest_verified_binary_is_placed() {
    let binary = b"#!/bin/sh\necho docker\n".to_vec();
    let manifest = format!(
        "{}  docker-buildx-linux-arm64\n{}  docker-buildx-linux-amd64\n",
        sha256_hex(b"other"),
        sha256_hex(&binary)
    );
    let host = ReleaseHost::start(vec![
        ("/v1/docker-buildx-linux-amd64", binary.clone()),
        ("/v1/checksums.txt", manifest.into_bytes()),
    ])
    .await;
    let out = TempDir::new().unwrap();
    let dest = out.path().join("docker-cli-plugins").join("docker-buildx");

    let spec = ToolSpec::binary(
        "docker-buildx",
        "1",
        host.url("/v1/docker-buildx-{os}-{arch}"),
        ChecksumSource::Manifest {
            url_template: host.url("/v{version}/checksums.txt"),
        },
        dest.clone(),
    );

    let (tx, mut rx) = mpsc::channel(100);
    let placed = fetch_one(&client(), &spec, &linux(), &ProgressSender::new(tx))
        .await
        .unwrap();

    assert_eq!(placed, dest);
    assert_eq!(std::fs::read(&dest).unwrap(), binary);
    assert_executable(&dest);

    let mut phases = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        phases.push(progress.phase);
    }
    assert_eq!(phases.first(), Some(&FetchPhase::Resolving));
    assert_eq!(phases.last(), Some(&FetchPhase::Complete));
}

#[tokio::test]
async fn sidecar_verified_archive_entry_is_extracted() {
    let archive = tar_gz(&[
        ("linux-amd64/README.md", b"readme"),
        ("linux-amd64/helm", b"helm binary"),
    ]);
    let sidecar = format!("{}  helm-v3.0.0-linux-amd64.tar.gz\n", sha256_hex(&archive));
    let host = ReleaseHost::start(vec![
        ("/helm-v3.0.0-linux-amd64.tar.gz", archive),
        ("/helm-v3.0.0-linux-amd64.tar.gz.sha256sum", sidecar.into_bytes()),
    ])
    .await;
    let out = TempDir::new().unwrap();
    let dest = out.path().join("bin").join("helm");

    let spec = ToolSpec::binary(
        "helm",
        "3.0.0",
        host.url("/helm-v{version}-{os}-{arch}.tar.gz"),
        ChecksumSource::Sidecar { suffix: ".sha256sum" },
        dest.clone(),
    )
    .with_archive(ArchiveKind::TarGz, Some("{os}-{arch}/helm{exe}".to_string()))
    .expand_entry(&linux());

    fetch_one(&client(), &spec, &linux(), &ProgressSender::none())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"helm binary");
    assert_executable(&dest);
}

#[tokio::test]
async fn mismatched_download_is_rejected_and_not_placed() {
    let host = ReleaseHost::start(vec![("/kuberlr", b"tampered".to_vec())]).await;
    let out = TempDir::new().unwrap();
    let dest = out.path().join("kuberlr");

    let spec = ToolSpec::binary(
        "kuberlr",
        "0.6.1",
        host.url("/kuberlr"),
        ChecksumSource::Inline(sha256_hex(b"genuine")),
        dest.clone(),
    );

    let err = fetch_one(&client(), &spec, &linux(), &ProgressSender::none())
        .await
        .unwrap_err();

    match err {
        FetchError::ChecksumMismatch {
            tool,
            expected,
            actual,
        } => {
            assert_eq!(tool, "kuberlr");
            assert_eq!(expected, sha256_hex(b"genuine"));
            assert_eq!(actual, sha256_hex(b"tampered"));
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[tokio::test]
async fn ambiguous_manifest_reports_candidate_count() {
    let binary = b"docker-compose".to_vec();
    let manifest = format!(
        "{0}  docker-compose-linux-x86_64\n{0}  *docker-compose-linux-x86_64\n",
        sha256_hex(&binary)
    );
    let host = ReleaseHost::start(vec![
        ("/docker-compose-linux-x86_64", binary),
        ("/checksums.txt", manifest.into_bytes()),
    ])
    .await;
    let out = TempDir::new().unwrap();

    let spec = ToolSpec::binary(
        "docker-compose",
        "2.0.0",
        host.url("/docker-compose-{os}-{machine}"),
        ChecksumSource::Manifest {
            url_template: host.url("/checksums.txt"),
        },
        out.path().join("docker-compose"),
    );

    let err = fetch_one(&client(), &spec, &linux(), &ProgressSender::none())
        .await
        .unwrap_err();

    match err {
        FetchError::ChecksumAmbiguous {
            file_name, count, ..
        } => {
            assert_eq!(file_name, "docker-compose-linux-x86_64");
            assert_eq!(count, 2);
        }
        other => panic!("expected ambiguous checksum, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_release_surfaces_http_status() {
    let host = ReleaseHost::start(vec![]).await;
    let out = TempDir::new().unwrap();

    let spec = ToolSpec::binary(
        "trivy",
        "0.0.1",
        host.url("/trivy.tar.gz"),
        ChecksumSource::Inline(sha256_hex(b"trivy")),
        out.path().join("trivy"),
    );

    let err = fetch_one(&client(), &spec, &linux(), &ProgressSender::none())
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::HttpStatus { status: 404, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn existing_destination_is_skipped_without_requests() {
    let archive = tar_gz(&[("index.html", b"<html></html>"), ("js/app.js", b"app")]);
    let sidecar = format!("{}\n", sha512_hex(&archive));
    let host = ReleaseHost::start(vec![
        ("/dashboard.tgz", archive),
        ("/dashboard.tgz.sha512sum", sidecar.into_bytes()),
    ])
    .await;
    let out = TempDir::new().unwrap();
    let dest: PathBuf = out.path().join("rancher-dashboard");

    let spec = ToolSpec::binary(
        "rancher-dashboard",
        "2.0.0",
        host.url("/dashboard.tgz"),
        ChecksumSource::Sidecar { suffix: ".sha512sum" },
        dest.clone(),
    )
    .with_archive(ArchiveKind::TarGz, None)
    .with_algorithm(DigestAlgorithm::Sha512)
    .skip_if_exists();

    fetch_one(&client(), &spec, &linux(), &ProgressSender::none())
        .await
        .unwrap();
    assert_eq!(std::fs::read(dest.join("index.html")).unwrap(), b"<html></html>");
    assert_eq!(std::fs::read(dest.join("js/app.js")).unwrap(), b"app");
    let hits = host.hits();
    assert_eq!(hits, 2);

    let (tx, mut rx) = mpsc::channel(10);
    let placed = fetch_one(&client(), &spec, &linux(), &ProgressSender::new(tx))
        .await
        .unwrap();

    assert_eq!(placed, dest);
    assert_eq!(host.hits(), hits);
    assert_eq!(rx.try_recv().unwrap().phase, FetchPhase::Skipped);
}

#[tokio::test]
async fn unpublished_checksum_is_fetched_unverified() {
    let host = ReleaseHost::start(vec![(
        "/docker-credential-ecr-login.exe",
        b"MZ ecr".to_vec(),
    )])
    .await;
    let out = TempDir::new().unwrap();
    let dest = out.path().join("docker-credential-ecr-login.exe");

    let spec = ToolSpec::binary(
        "docker-credential-ecr-login",
        "0.9.1",
        host.url("/docker-credential-ecr-login{exe}"),
        ChecksumSource::Unpublished {
            reason: "no checksum published for this build",
        },
        dest.clone(),
    );

    let windows = Platform::new(OsFamily::Windows, Arch::Amd64);
    fetch_one(&client(), &spec, &windows, &ProgressSender::none())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"MZ ecr");
    assert_eq!(host.hits(), 1);
}

fn impatient_client() -> HttpClient {
    HttpClient::new(&HttpConfig {
        inactivity_timeout_secs: 1,
        ..HttpConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn silent_host_fails_as_stalled() {
    let base = silent_host(b"").await;
    let out = TempDir::new().unwrap();

    let spec = ToolSpec::binary(
        "helm",
        "3.0.0",
        format!("{base}/helm.tar.gz"),
        ChecksumSource::Inline(sha256_hex(b"helm")),
        out.path().join("helm"),
    );

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        fetch_one(&impatient_client(), &spec, &linux(), &ProgressSender::none()),
    )
    .await
    .expect("fetch should give up on a silent host");

    match result {
        Err(FetchError::Stalled { seconds, .. }) => assert_eq!(seconds, 1),
        other => panic!("expected stalled download, got {other:?}"),
    }
}

#[tokio::test]
async fn body_that_stops_midway_fails_as_stalled() {
    let base = silent_host(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial body").await;
    let out = TempDir::new().unwrap();
    let dest = out.path().join("trivy");

    let spec = ToolSpec::binary(
        "trivy",
        "0.0.1",
        format!("{base}/trivy"),
        ChecksumSource::Inline(sha256_hex(b"trivy")),
        dest.clone(),
    );

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        fetch_one(&impatient_client(), &spec, &linux(), &ProgressSender::none()),
    )
    .await
    .expect("fetch should give up on a stalled body");

    assert!(
        matches!(result, Err(FetchError::Stalled { .. })),
        "unexpected result: {result:?}"
    );
    assert!(!dest.exists());
}

fn binary_spec(host: &ReleaseHost, name: &str, body: &[u8], bin_dir: &std::path::Path) -> ToolSpec {
    ToolSpec::binary(
        name,
        "1.0.0",
        host.url(&format!("/{name}")),
        ChecksumSource::Inline(sha256_hex(body)),
        bin_dir.join(name),
    )
}

#[tokio::test]
async fn one_failing_tool_fails_the_whole_run() {
    let host = ReleaseHost::start(vec![("/kuberlr", b"kuberlr".to_vec())]).await;
    let out = TempDir::new().unwrap();
    let bin_dir = out.path().join("bin");

    let specs = vec![
        binary_spec(&host, "kuberlr", b"kuberlr", &bin_dir),
        binary_spec(&host, "helm", b"helm", &bin_dir),
    ];

    let err = fetch_specs(&client(), &specs, &linux(), &bin_dir, &ProgressSender::none())
        .await
        .unwrap_err();

    match &err {
        FetchError::Tool { tool, .. } => assert_eq!(tool, "helm"),
        other => panic!("expected a tool-wrapped error, got {other:?}"),
    }
    assert!(matches!(err.root(), FetchError::HttpStatus { status: 404, .. }));
    assert!(std::fs::symlink_metadata(bin_dir.join("kubectl")).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn successful_run_binds_kubectl_to_kuberlr() {
    let host = ReleaseHost::start(vec![
        ("/kuberlr", b"kuberlr".to_vec()),
        ("/helm", b"helm".to_vec()),
    ])
    .await;
    let out = TempDir::new().unwrap();
    let bin_dir = out.path().join("bin");

    let specs = vec![
        binary_spec(&host, "kuberlr", b"kuberlr", &bin_dir),
        binary_spec(&host, "helm", b"helm", &bin_dir),
    ];

    let placed = fetch_specs(&client(), &specs, &linux(), &bin_dir, &ProgressSender::none())
        .await
        .unwrap();

    let kubectl = bin_dir.join("kubectl");
    assert_eq!(
        placed,
        vec![bin_dir.join("kuberlr"), bin_dir.join("helm"), kubectl.clone()]
    );
    assert_eq!(std::fs::read_link(&kubectl).unwrap(), PathBuf::from("kuberlr"));
    assert_eq!(std::fs::read(&kubectl).unwrap(), b"kuberlr");
}
