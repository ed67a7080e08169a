//! Fetch progress tracking with download metadata

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Phase of an individual tool fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Resolving,   // Fetching the published checksum
    Downloading, // Streaming the artifact
    Verifying,   // Comparing digests
    Extracting,  // Placing the binary
    Skipped,     // Destination already present
    Complete,
}

/// Progress update for one tool
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub tool: String,
    pub phase: FetchPhase,
    pub bytes_downloaded: u64,
    /// From `Content-Length`, when the host sends one
    pub total_bytes: Option<u64>,
}

impl FetchProgress {
    pub fn new(tool: impl Into<String>, phase: FetchPhase) -> Self {
        Self {
            tool: tool.into(),
            phase,
            bytes_downloaded: 0,
            total_bytes: None,
        }
    }

    pub fn downloading(tool: impl Into<String>, bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        Self {
            tool: tool.into(),
            phase: FetchPhase::Downloading,
            bytes_downloaded,
            total_bytes,
        }
    }

    /// Human-readable status line
    pub fn message(&self) -> String {
        match self.phase {
            FetchPhase::Resolving => format!("🔍 Resolving checksum for {}...", self.tool),
            FetchPhase::Downloading => {
                let mb_downloaded = self.bytes_downloaded as f64 / 1_048_576.0;
                match self.total_bytes {
                    Some(total) => format!(
                        "📥 Downloading {} ({:.1} MB / {:.1} MB)",
                        self.tool,
                        mb_downloaded,
                        total as f64 / 1_048_576.0
                    ),
                    None => format!("📥 Downloading {} ({:.1} MB)", self.tool, mb_downloaded),
                }
            }
            FetchPhase::Verifying => format!("🔐 Verifying {}...", self.tool),
            FetchPhase::Extracting => format!("📦 Extracting {}...", self.tool),
            FetchPhase::Skipped => format!("⏭ {} already present", self.tool),
            FetchPhase::Complete => format!("✅ {} complete", self.tool),
        }
    }
}

/// Best-effort progress channel shared by concurrent fetches
///
/// A closed receiver never fails a fetch: the first failed send logs a
/// warning and disables further updates.
#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<FetchProgress>>,
    disabled: Arc<AtomicBool>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<FetchProgress>) -> Self {
        Self {
            tx: Some(tx),
            disabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sender that drops every update
    pub fn none() -> Self {
        Self {
            tx: None,
            disabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn send(&self, progress: FetchProgress) {
        let Some(tx) = &self.tx else {
            return;
        };
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(progress) {
            warn!("Progress channel closed, continuing without updates");
            self.disabled.store(true, Ordering::Relaxed);
        }
    }
}
