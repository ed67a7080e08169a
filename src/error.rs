//! Error types for dependency fetching
//!
//! Every variant is terminal for a fetch run. Nothing here is retried.

use thiserror::Error;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while fetching, verifying or placing a tool.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure talking to a release host.
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Release host answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// No bytes arrived within the inactivity timeout.
    #[error("Download of {url} stalled: no data received for {seconds} seconds")]
    Stalled { url: String, seconds: u64 },

    /// A checksum manifest did not contain exactly one line for the file.
    #[error("Expected exactly one checksum for {file_name} in {manifest_url}, found {count}")]
    ChecksumAmbiguous {
        file_name: String,
        manifest_url: String,
        count: usize,
    },

    /// A checksum file had no usable digest.
    #[error("Checksum file {0} contains no digest")]
    ChecksumMalformed(String),

    /// Downloaded bytes do not match the published digest.
    #[error("Checksum mismatch for {tool}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        tool: String,
        expected: String,
        actual: String,
    },

    /// A path that depends on the environment (e.g. the home directory) is unavailable.
    #[error("Missing environment: {0}")]
    MissingEnvironment(String),

    /// The archive could not be unpacked or lacked the requested entry.
    #[error("Failed to extract '{entry}' from {archive}: {message}")]
    Extraction {
        archive: String,
        entry: String,
        message: String,
    },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid download URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps a failure with the name of the tool being fetched.
    #[error("Failed to fetch {tool}: {source}")]
    Tool {
        tool: String,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    pub fn extraction(
        archive: impl Into<String>,
        entry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Extraction {
            archive: archive.into(),
            entry: entry.into(),
            message: message.into(),
        }
    }

    pub fn for_tool(tool: impl Into<String>, source: FetchError) -> Self {
        Self::Tool {
            tool: tool.into(),
            source: Box::new(source),
        }
    }

    /// Strip any `Tool` wrappers and return the underlying error.
    pub fn root(&self) -> &FetchError {
        match self {
            Self::Tool { source, .. } => source.root(),
            other => other,
        }
    }
}
