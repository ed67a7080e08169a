//! Release download, verification and placement
//!
//! ## Module Organization
//!
//! - `platform` - Target OS/architecture and executable naming
//! - `spec` - Static tool descriptions and URL templates
//! - `context` - Resolved destination layout for a run
//! - `checksum` - Checksum resolution and digest verification
//! - `http` - Streaming downloads from release hosts
//! - `extract` - tar.gz and zip extraction
//! - `core` - Per-tool fetch and concurrent orchestration

pub mod checksum;
pub mod context;
mod core;
pub mod extract;
pub mod http;
pub mod platform;
pub mod spec;

// Re-export public API
pub use context::DownloadContext;
pub use self::core::{fetch_all, fetch_one, fetch_specs, resolve_checksum};
pub use http::HttpClient;
pub use platform::{Arch, OsFamily, Platform};
pub use spec::{ArchiveKind, ChecksumSource, ToolSpec};
