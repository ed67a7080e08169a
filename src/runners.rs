//! Top-level runners for each subcommand

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio::sync::mpsc;

use bundle_deps::download::{ChecksumSource, DownloadContext, Platform, ToolSpec};
use bundle_deps::progress::{FetchPhase, FetchProgress, ProgressSender};
use bundle_deps::{FetcherConfig, fetch_all, tools};

use crate::cli::TargetArgs;

/// Resolve the target platform and destination layout from CLI flags
fn build_context(config_path: Option<&Path>, target: &TargetArgs) -> Result<DownloadContext> {
    let config = FetcherConfig::load(config_path)?;
    let host = Platform::detect().context("Cannot default to the host platform")?;
    let platform = Platform::new(
        target.os.unwrap_or(host.os),
        target.arch.unwrap_or(host.arch),
    );

    Ok(DownloadContext::new(platform, config, &target.resources))
}

/// Download, verify and place every bundled tool
pub async fn run_fetch(config_path: Option<&Path>, target: &TargetArgs, no_progress: bool) -> Result<()> {
    let context = build_context(config_path, target)?;

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
    let _ = writeln!(stdout, "🔧 Fetching bundled dependencies");
    let _ = stdout.reset();
    let _ = writeln!(stdout, "Platform: {}", context.platform);
    let _ = writeln!(stdout, "Resources: {}\n", context.resources_dir.display());

    // Create progress channel for download monitoring
    let (tx, rx) = mpsc::channel::<FetchProgress>(100);

    let progress_task = if no_progress {
        tokio::spawn(print_progress(rx))
    } else {
        tokio::spawn(draw_progress(rx))
    };

    let result = fetch_all(&context, ProgressSender::new(tx)).await;

    // Sender is dropped with the fetch; let the consumer drain what is left
    progress_task.await.ok();

    let placed = result.context("Failed to fetch bundled dependencies")?;

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(stdout, "\n✅ Fetched {} dependencies", placed.len());
    let _ = stdout.reset();
    for path in &placed {
        let _ = writeln!(stdout, "   {}", path.display());
    }

    Ok(())
}

/// Non-interactive consumer: one line per phase change on stderr
async fn print_progress(mut rx: mpsc::Receiver<FetchProgress>) {
    let mut pending = HashMap::new();

    while let Some(progress) = rx.recv().await {
        for line in plain_lines(&mut pending, progress) {
            eprintln!("{line}");
        }
    }
}

/// Lines to print for one update, holding back byte counts until the stream ends
///
/// The last `Downloading` update of a tool is printed once that tool moves on
/// to its next phase, whether or not the total size was known.
fn plain_lines(pending: &mut HashMap<String, FetchProgress>, progress: FetchProgress) -> Vec<String> {
    if progress.phase == FetchPhase::Downloading {
        pending.insert(progress.tool.clone(), progress);
        return Vec::new();
    }

    let mut lines = Vec::new();
    if let Some(downloaded) = pending.remove(&progress.tool) {
        lines.push(downloaded.message());
    }
    lines.push(progress.message());
    lines
}

/// Interactive consumer: one progress bar per tool
async fn draw_progress(mut rx: mpsc::Receiver<FetchProgress>) {
    let multi = MultiProgress::new();
    let style = ProgressStyle::default_bar()
        .template("[{bar:40.green/blue}] {bytes:>10}/{total_bytes:<10} {msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    while let Some(progress) = rx.recv().await {
        let bar = bars
            .entry(progress.tool.clone())
            .or_insert_with(|| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(style.clone());
                bar
            });

        match progress.phase {
            FetchPhase::Downloading => {
                if let Some(total) = progress.total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(progress.bytes_downloaded);
                bar.set_message(progress.message());
            }
            FetchPhase::Skipped | FetchPhase::Complete => {
                bar.finish_with_message(progress.message());
            }
            _ => bar.set_message(progress.message()),
        }
    }

    for bar in bars.values() {
        if !bar.is_finished() {
            bar.abandon();
        }
    }
}

/// Print what `fetch` would do for the selected target
pub fn run_list(config_path: Option<&Path>, target: &TargetArgs) -> Result<()> {
    let context = build_context(config_path, target)?;
    let specs = tools::tool_specs(&context)?;

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
    let _ = writeln!(stdout, "Dependencies for {}", context.platform);
    let _ = stdout.reset();

    for spec in &specs {
        let _ = stdout.set_color(ColorSpec::new().set_bold(true));
        let _ = write!(stdout, "\n{} {}", spec.name, spec.version);
        let _ = stdout.reset();
        let _ = writeln!(stdout);
        let _ = writeln!(stdout, "   url:      {}", spec.resolved_url(&context.platform));
        let _ = writeln!(stdout, "   checksum: {}", describe_checksum(spec, &context.platform));
        let _ = writeln!(stdout, "   dest:     {}", spec.destination.display());
        if spec.skip_if_exists {
            let _ = writeln!(stdout, "   (skipped when already present)");
        }
    }

    Ok(())
}

fn describe_checksum(spec: &ToolSpec, platform: &Platform) -> String {
    let algorithm = spec.algorithm.name();
    match &spec.checksum {
        ChecksumSource::Inline(digest) => format!("{algorithm} {digest}"),
        ChecksumSource::Sidecar { suffix } => {
            format!("{algorithm} from {}{}", spec.resolved_url(platform), suffix)
        }
        ChecksumSource::Manifest { url_template } => {
            format!("{algorithm} from {}", spec.expand(url_template, platform))
        }
        ChecksumSource::Unpublished { reason } => format!("not verified: {reason}"),
    }
}

/// Write the default configuration file
pub fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    FetcherConfig::write_default(path)?;

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
    let _ = writeln!(stdout, "✓ Wrote default configuration to {}", path.display());
    let _ = stdout.reset();

    Ok(())
}
