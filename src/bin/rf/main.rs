//! Command-line binary entrypoint for `rf`.
//!
//! Parses arguments, layers them over the settings file and runs a single
//! download through the library.
mod args;

use anyhow::Result;
use args::Args;
use clap::Parser;
use indicatif::MultiProgress;
use rangefetch::observer::ProgressLogWriter;
use rangefetch::{DownloadConfig, Downloader, Outcome, Partition, Settings};
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

fn init_logging(verbose: bool, multi: &MultiProgress) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let writer = ProgressLogWriter::new(multi.clone());
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(move || writer.clone())
        .init();
}

fn build_config(args: &Args, settings: &Settings) -> DownloadConfig {
    let mut config = DownloadConfig::from_settings(settings);

    if let Some(block) = args.block_size.and_then(NonZeroU64::new) {
        config.partition = Partition::BlockSize(block);
    } else if let Some(threads) = args.threads.and_then(NonZeroU64::new) {
        config.partition = Partition::FixedCount(threads);
    }
    if let Some(dir) = &args.dir {
        config.dir = PathBuf::from(dir);
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    config.filename = args.output.clone();

    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let multi_progress = MultiProgress::new();
    init_logging(args.verbose, &multi_progress);

    let settings = Settings::load().unwrap_or_else(|e| {
        tracing::warn!("ignoring settings file: {:#}", e);
        Settings::default()
    });
    let config = build_config(&args, &settings);

    let downloader = Downloader::new(config)?.with_progress(multi_progress);

    let cancel_token = downloader.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Received Ctrl+C. Stopping; segments are kept for resume...");
            cancel_token.cancel();
        }
    });

    match downloader.run(&args.link).await? {
        Outcome::AlreadyPresent { path } => {
            println!("{} already exists, nothing to do.", path.display());
        }
        Outcome::Completed(summary) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "✅ Download succeeded: {} ({} bytes) in {:.2?}",
                    summary.path.display(),
                    summary.bytes,
                    summary.elapsed
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let args = Args::parse_from(["rf", "--link", "http://x/a.bin", "-t", "8", "-d", "out"]);
        let settings = Settings {
            threads: Some(2),
            default_dir: Some("tmp".into()),
            ..Default::default()
        };

        let config = build_config(&args, &settings);
        assert_eq!(config.dir, PathBuf::from("out"));
        assert!(matches!(config.partition, Partition::FixedCount(n) if n.get() == 8));
    }

    #[test]
    fn test_block_size_flag_selects_size_bounded_mode() {
        let args = Args::parse_from(["rf", "-l", "http://x/a.bin", "--block-size", "1048576"]);
        let config = build_config(&args, &Settings::default());
        assert!(matches!(config.partition, Partition::BlockSize(b) if b.get() == 1_048_576));
    }

    #[test]
    fn test_link_is_required() {
        assert!(Args::try_parse_from(["rf"]).is_err());
        assert!(Args::try_parse_from(["rf", "-l", "http://x/a", "-t", "0"]).is_err());
    }
}
