use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use podmerge::{Config, ConsoleReporter, FeedMerger};

#[derive(Parser, Debug)]
#[command(
    name = "podmerge",
    about = "Merge a legacy podcast feed with the current one into a single RSS feed"
)]
struct Args {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(long, value_name = "FILE", default_value = "podmerge.toml")]
    config: PathBuf,

    /// Merge the local legacy feed copy instead of downloading it first
    #[arg(long)]
    skip_fetch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if args.skip_fetch {
        config.skip_fetch = true;
    }
    config.validate().context("Invalid configuration")?;
    tracing::debug!(config = ?config, "Effective configuration");

    let merger = FeedMerger::new(config).context("Failed to initialize feed merger")?;
    let mut reporter = ConsoleReporter;

    println!("Merging podcast feeds: legacy + current");

    match merger.run(&mut reporter).await {
        Ok(_) => {
            println!();
            println!(
                "Done. Check the feed with a podcast validator before publishing {}",
                merger.config().self_link_url
            );
            Ok(())
        }
        // Run failures are printed by the reporter as they happen
        Err(_) => std::process::exit(1),
    }
}
