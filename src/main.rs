// src/main.rs
// =============================================================================
// Entry point of the scraped CLI.
//
// What happens here:
// 1. Parse command-line arguments (clap) and set up logging (tracing)
// 2. Collect URLs from the arguments and, when piped, from stdin
// 3. Run the crawl while a progress consumer drains its events
// 4. Print the results: rendered markdown, JSON, or .md files
// 5. Exit with a status code (0 = pages scraped, 1 = every page failed,
//    2 = could not run at all)
//
// Ctrl-C cancels the crawl; whatever finished before that is still shown.
// =============================================================================

mod cli;
mod output;
mod scraper;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Cli;
use is_terminal::IsTerminal;
use scraper::{CrawlOptions, FetchOutcome};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    init_logging(&cli)?;

    let urls = collect_urls(&cli.urls)?;
    if urls.is_empty() {
        bail!("no URLs provided; pass them as arguments or pipe them via stdin");
    }
    debug!(count = urls.len(), "collected URLs");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut options = CrawlOptions::new(urls);
    options.max_depth = cli.depth;
    options.parallelism = usize::from(cli.parallelism);
    options.max_pages = cli.max_pages;
    options.cross_domains = cli.cross_domains;
    options.request_timeout = Duration::from_secs(cli.timeout);
    options.events = Some(events_tx);

    let show_bar = !cli.no_progress && !cli.quiet && io::stderr().is_terminal();
    let progress = output::progress::spawn(events_rx, show_bar);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let results = scraper::run(cancel, options)
        .await
        .context("scraping failed")?;

    // The engine dropped its sender, so the consumer drains and stops
    let tally = progress.await.context("progress display crashed")?;
    if show_bar {
        eprintln!(
            "Scraped {} page(s), {} error(s), {} skipped",
            tally.stored, tally.errors, tally.skipped
        );
    }

    emit_results(&cli, &results).await?;

    if !results.is_empty() && results.iter().all(|r| !r.is_ok()) {
        Ok(1)
    } else {
        Ok(0)
    }
}

async fn emit_results(cli: &Cli, results: &[FetchOutcome]) -> Result<()> {
    if let Some(dir) = &cli.output_dir {
        let written = output::write_files(results, dir).await?;
        eprintln!("Saved {} file(s) to {}", written.len(), dir.display());
        return Ok(());
    }

    let rendered = if cli.json {
        output::to_json(results)?
    } else {
        output::render_results(results, cli.word_wrap)
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", rendered.trim_end()).context("failed to write to stdout")?;
    Ok(())
}

// URLs from the arguments, then one per line from stdin when it is piped
fn collect_urls(args: &[String]) -> Result<Vec<String>> {
    let mut urls = args.to_vec();

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        for line in stdin.lock().lines() {
            let line = line.context("failed to read URLs from stdin")?;
            let line = line.trim();
            if !line.is_empty() {
                urls.push(line.to_string());
            }
        }
    }

    Ok(urls)
}

// Logs go to stderr so stdout stays clean for the rendered pages
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Styled output only makes sense on a terminal
    if cli.json || std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
    Ok(())
}
