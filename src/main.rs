//! Rufus main entry point
//!
//! This is the command-line interface for the Rufus topic-guided crawler.

use anyhow::Context;
use clap::Parser;
use rufus::config::{load_config_with_hash, validate, Config};
use rufus::crawler::Coordinator;
use rufus::output::print_report;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Rufus: a topic-guided web crawler
///
/// Rufus crawls outward from a seed URL, keeps the text sections that match
/// the topic prompt, and writes the results after every accepted page.
#[derive(Parser, Debug)]
#[command(name = "rufus")]
#[command(version)]
#[command(about = "A topic-guided web crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "SEED_URL")]
    seed: String,

    /// Topic prompt; its words drive relevance filtering and link scoring
    #[arg(value_name = "PROMPT")]
    prompt: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured maximum depth
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Directory for the output files (keeps their configured file names)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    handle_crawl(config, config_hash, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rufus=info,warn"),
            1 => EnvFilter::new("rufus=debug,info"),
            2 => EnvFilter::new("rufus=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }

    if let Some(dir) = &cli.output_dir {
        config.output.json_path = in_dir(dir, &config.output.json_path);
        config.output.tabular_path = in_dir(dir, &config.output.tabular_path);
    }
}

fn in_dir(dir: &Path, path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => dir.join(name),
        None => dir.join(path),
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Rufus Dry Run ===\n");

    println!("Seed: {}", cli.seed);
    println!(
        "Keywords: {}",
        rufus::Keywords::from_prompt(&cli.prompt).terms().join(", ")
    );

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Request timeout: {}ms",
        config.crawler.per_request_timeout_ms
    );
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.politeness_delay_min_ms, config.crawler.politeness_delay_max_ms
    );
    println!(
        "  Rate-limit retries: {}",
        config.crawler.max_retries_on_rate_limit
    );
    println!(
        "  Renderer fallback: {}",
        config.crawler.use_renderer_fallback
    );
    println!("  Link validation: {}", config.crawler.validate_links);

    println!("\nUser Agents ({}):", config.user_agent.pool.len());
    for ua in &config.user_agent.pool {
        println!("  - {}", ua);
    }

    println!("\nOutput:");
    println!("  JSON: {}", config.output.json_path.display());
    println!(
        "  Tabular ({:?}): {}",
        config.output.tabular_format,
        config.output.tabular_path.display()
    );

    println!(
        "\nKeyword refinement: {}",
        if config.refinement.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: Option<String>,
    cli: &Cli,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // Ctrl-C stops the crawl; pages already written stay on disk
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            signal_token.cancel();
        }
    });

    let mut coordinator =
        Coordinator::new(config, &cli.seed, &cli.prompt)?.with_cancellation(cancel);
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }

    let report = coordinator.run().await;
    if !cli.quiet {
        print_report(&report);
    }

    if let Some(reason) = &report.aborted {
        tracing::warn!("Crawl stopped early: {}", reason);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_override() {
        let cli = Cli::parse_from([
            "rufus",
            "https://example.com",
            "AI",
            "--output-dir",
            "/tmp/run",
            "--max-depth",
            "1",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.crawler.max_depth, 1);
        assert_eq!(config.output.json_path, PathBuf::from("/tmp/run/output.json"));
        assert_eq!(config.output.tabular_path, PathBuf::from("/tmp/run/output.csv"));
    }
}
