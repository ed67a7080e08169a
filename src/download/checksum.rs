//! Checksum resolution and digest verification
//!
//! Publishers ship digests in three shapes: a sidecar file next to the
//! artifact (`kubectl.sha256`), a sidecar in `sha256sum` format
//! (`<digest>  <file>`), or a manifest listing every artifact of a release.
//! Manifests must contain exactly one line for the requested file.

use sha2::{Digest, Sha256, Sha512};

use crate::error::{FetchError, Result};

/// Digest algorithm used by a publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

/// Incremental hasher fed while a download streams to disk
pub enum StreamingDigest {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamingDigest {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Lowercase hex digest
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Normalise the file-name column of a checksum line
fn manifest_file_name(field: &str) -> &str {
    let field = field.strip_prefix('*').unwrap_or(field);
    field.strip_prefix("./").unwrap_or(field)
}

/// Pick the digest for `file_name` out of a multi-line manifest
///
/// `manifest_url` is only used for error reporting.
pub fn find_checksum(manifest: &str, file_name: &str, manifest_url: &str) -> Result<String> {
    let matches: Vec<&str> = manifest
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let digest = fields.next()?;
            let name = fields.next()?;
            (manifest_file_name(name) == file_name).then_some(digest)
        })
        .collect();

    match matches.as_slice() {
        [digest] => Ok((*digest).to_string()),
        _ => Err(FetchError::ChecksumAmbiguous {
            file_name: file_name.to_string(),
            manifest_url: manifest_url.to_string(),
            count: matches.len(),
        }),
    }
}

/// Read the digest from a sidecar file (bare digest or `sha256sum` format)
pub fn parse_sidecar(contents: &str, sidecar_url: &str) -> Result<String> {
    contents
        .lines()
        .find_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .ok_or_else(|| FetchError::ChecksumMalformed(sidecar_url.to_string()))
}

/// Compare a computed digest against the published one
pub fn verify(tool: &str, expected: &str, actual: &str) -> Result<()> {
    if expected.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(FetchError::ChecksumMismatch {
            tool: tool.to_string(),
            expected: expected.to_ascii_lowercase(),
            actual: actual.to_ascii_lowercase(),
        })
    }
}
