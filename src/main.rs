mod cli;
mod runners;

use anyhow::Result;
use clap::Parser;
use log::error;

fn main() {
    // Initialize logger with custom format
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Args::parse();

    match args.sub {
        cli::Cmd::Fetch {
            target,
            no_progress,
        } => runners::run_fetch(args.config.as_deref(), &target, no_progress).await,
        cli::Cmd::List { target } => runners::run_list(args.config.as_deref(), &target),
        cli::Cmd::InitConfig { path, force } => runners::run_init_config(&path, force),
    }
}
