// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
// There is a single command: give it URLs (as arguments or piped on stdin)
// and it prints them back as markdown. Flags control crawling depth,
// parallelism, limits and where the output goes.
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scraped",
    version,
    about = "Scrape web pages and convert them to markdown",
    long_about = "scraped fetches web pages and turns them into markdown. Servers that speak \
                  markdown (Accept: text/markdown) are used directly; HTML is converted.",
    after_help = "Examples:\n  \
                  scraped https://example.com\n  \
                  scraped -o ./docs https://example.com https://www.rust-lang.org\n  \
                  cat urls.txt | scraped\n  \
                  scraped -d 2 -p 20 https://example.com"
)]
pub struct Cli {
    /// URLs to scrape (also read line by line from stdin when piped)
    pub urls: Vec<String>,

    /// Save .md files to this directory instead of rendering to the terminal
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Crawl depth: 0 = only the given URLs, 1 = also pages they link to, ...
    #[arg(short, long, default_value_t = 0)]
    pub depth: usize,

    /// Number of parallel requests
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub parallelism: u16,

    /// Word wrap width for terminal rendering
    #[arg(short, long, default_value_t = 80)]
    pub word_wrap: usize,

    /// Maximum number of pages to fetch (0 = unlimited)
    #[arg(short, long, default_value_t = 0)]
    pub max_pages: usize,

    /// Allow crawling across different domains
    #[arg(long)]
    pub cross_domains: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    pub timeout: u64,

    /// Print all results as JSON instead of rendering them
    #[arg(long, conflicts_with = "output_dir")]
    pub json: bool,

    /// Do not show the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Show debug logs
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long)]
    pub quiet: bool,
}
