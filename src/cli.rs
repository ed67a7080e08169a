use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use bundle_deps::download::{Arch, OsFamily};

#[derive(Parser, Debug)]
#[command(version, about = "Fetch and verify the third-party tools bundled with the installer")]
pub struct Args {
    /// Path to configuration file (version pins, HTTP settings)
    #[arg(long, short = 'c', global = true, env = "BUNDLE_DEPS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub sub: Cmd,
}

/// Platform and destination selection shared by `fetch` and `list`
#[derive(ClapArgs, Debug, Clone)]
pub struct TargetArgs {
    /// Target OS (linux, darwin, win32); defaults to the host
    #[arg(long)]
    pub os: Option<OsFamily>,

    /// Target architecture (amd64, arm64); defaults to the host
    #[arg(long)]
    pub arch: Option<Arch>,

    /// Resources directory that receives `<os>/bin`, `<os>/internal`, ...
    #[arg(long, default_value = "resources")]
    pub resources: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Download, verify and place every bundled tool
    Fetch {
        #[command(flatten)]
        target: TargetArgs,

        /// Print plain log lines instead of progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Show what would be fetched, without downloading
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Write the default configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = "bundle-deps.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
