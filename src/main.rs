//! Tululu CLI - downloads books, covers and metadata from a category of tululu.org.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tululu::config::Config;
use tululu::console::Console;
use tululu::crawler::{CrawlOptions, Crawler};
use tululu::fetcher::HttpFetcher;
use tululu::logging;

/// Downloads books from a tululu.org category.
#[derive(Parser, Debug)]
#[command(name = "tululu")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// First category page to crawl.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    start_page: u32,

    /// Last category page to crawl (inclusive).
    #[arg(long, default_value_t = 701, value_parser = clap::value_parser!(u32).range(1..))]
    end_page: u32,

    /// Directory receiving books/, images/ and the record file.
    #[arg(long)]
    dest_folder: Option<PathBuf>,

    /// Do not download cover images.
    #[arg(long)]
    skip_imgs: bool,

    /// Do not download book texts.
    #[arg(long)]
    skip_txt: bool,

    /// Record file path, relative to the destination folder.
    #[arg(long)]
    json_path: Option<PathBuf>,

    /// Include book ids in the record file.
    #[arg(long)]
    with_id: bool,

    /// Use this config file instead of the default one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log debug output to stderr and the log file.
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Applies command-line overrides on top of the config file.
    fn apply(&self, config: &mut Config) {
        if let Some(dest) = &self.dest_folder {
            config.paths.dest_folder = dest.clone();
        }
        if let Some(json_path) = &self.json_path {
            config.paths.json_path = json_path.clone();
        }
        if self.with_id {
            config.crawl.include_id = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    console.heading("Tululu - Book Catalog Crawler");

    if args.start_page > args.end_page {
        anyhow::bail!(
            "Start page ({}) cannot be greater than end page ({})",
            args.start_page,
            args.end_page
        );
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let _log_guard =
        logging::init(&config.paths.log_file, args.debug).context("Failed to set up logging")?;

    if config.site.insecure_tls {
        tracing::debug!("TLS certificate validation disabled for {}", config.site.base_url);
    }

    let mut options = CrawlOptions::from_config(&config, args.start_page..=args.end_page)?;
    options.skip_images = args.skip_imgs;
    options.skip_text = args.skip_txt;

    console.plan(&options);

    let fetcher = HttpFetcher::new(&config.site, config.crawl.delay_between_requests_sec)
        .context("Failed to create HTTP client")?;
    let crawler = Crawler::new(Box::new(fetcher), options);

    let report = match crawler.run().await {
        Ok(report) => report,
        Err(e) => {
            console.failure(&format!("Crawl aborted: {:#}", e));
            return Err(e);
        }
    };

    console.report(&report);
    Ok(())
}
