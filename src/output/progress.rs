// src/output/progress.rs
// =============================================================================
// Live progress while a crawl runs.
//
// The engine pushes CrawlEvents into an unbounded channel. One consumer task
// (spawned here) drains it, keeps a tally, and drives an indicatif progress
// bar: its length is the number of fetches started, its position the number
// finished. Without a bar (piped output, --no-progress) the same events are
// logged through tracing instead.
// =============================================================================

use crate::scraper::CrawlEvent;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// Counters kept from the event stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub started: usize,
    pub finished: usize,
    pub stored: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl Tally {
    pub fn apply(&mut self, event: &CrawlEvent) {
        match event {
            CrawlEvent::Fetching { .. } => self.started += 1,
            CrawlEvent::Done { .. } if event.is_skipped() => {
                self.finished += 1;
                self.skipped += 1;
            }
            CrawlEvent::Done { .. } => {
                self.finished += 1;
                self.stored += 1;
            }
            CrawlEvent::Error { .. } => {
                self.finished += 1;
                self.errors += 1;
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.started.saturating_sub(self.finished)
    }
}

// Spawns the single consumer of the event channel.
//
// The task ends when every sender is gone (the crawl finished) and hands
// back the final tally.
pub fn spawn(mut events: UnboundedReceiver<CrawlEvent>, show_bar: bool) -> JoinHandle<Tally> {
    tokio::spawn(async move {
        let bar = show_bar.then(new_bar);
        let mut tally = Tally::default();

        while let Some(event) = events.recv().await {
            tally.apply(&event);
            match &bar {
                Some(bar) => update_bar(bar, &tally, &event),
                None => log_event(&event),
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        tally
    })
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.blue} [{bar:30.cyan/magenta}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn update_bar(bar: &ProgressBar, tally: &Tally, event: &CrawlEvent) {
    bar.set_length(tally.started as u64);
    bar.set_position(tally.finished as u64);

    match event {
        CrawlEvent::Fetching { url } => {
            bar.set_message(format!("{} active · {url}", tally.in_flight()));
        }
        CrawlEvent::Error { url, error } => bar.println(format!("  ✗ {url}: {error}")),
        CrawlEvent::Done { .. } => {}
    }
}

fn log_event(event: &CrawlEvent) {
    let url = event.url();
    match event {
        CrawlEvent::Fetching { .. } => info!(url, "fetching"),
        CrawlEvent::Done {
            origin: Some(origin),
            ..
        } => info!(url, source = origin.as_str(), "done"),
        CrawlEvent::Done { origin: None, .. } => info!(url, "skipped"),
        CrawlEvent::Error { error, .. } => warn!(url, %error, "failed"),
    }
}
