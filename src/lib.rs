//! Fetches the third-party CLI tools bundled with the desktop installer
//!
//! Each tool is downloaded for the target platform, verified against its
//! published checksum, extracted when archived, and placed under the
//! resources directory the application expects.

pub mod binding;
pub mod config;
pub mod download;
pub mod error;
pub mod progress;
pub mod tools;

pub use config::FetcherConfig;
pub use download::{DownloadContext, Platform, fetch_all, fetch_one};
pub use error::{FetchError, Result};
pub use progress::{FetchPhase, FetchProgress, ProgressSender};
