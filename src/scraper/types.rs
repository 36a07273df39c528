// src/scraper/types.rs
// =============================================================================
// Data types shared by the crawl engine and its consumers.
//
// - FetchOutcome: one per visited address (either a page or an error)
// - CrawlOptions: caller-supplied settings, fixed for the whole run
// - CrawlEvent: progress notifications pushed onto a channel
// - FetchError / CrawlError: per-page and per-run failures
//
// Rust concepts:
// - Result<Page, FetchError> inside FetchOutcome makes "content XOR error"
//   impossible to break: a value is either Ok or Err, never both
// - thiserror: derive Display/Error for our error enums
// =============================================================================

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the markdown of a page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The server answered with `text/markdown` and the body was used as-is
    Native,
    /// The server answered with HTML which we converted to markdown
    Converted,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Native => "native",
            Origin::Converted => "converted",
        }
    }
}

// A successfully scraped page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub markdown: String,
    pub origin: Origin,
}

// The outcome of one fetch attempt that was actually started
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The fragment-stripped URL that was requested
    pub url: String,
    pub result: Result<Page, FetchError>,
}

impl FetchOutcome {
    pub fn page(url: impl Into<String>, markdown: impl Into<String>, origin: Origin) -> Self {
        Self {
            url: url.into(),
            result: Ok(Page {
                markdown: markdown.into(),
                origin,
            }),
        }
    }

    pub fn failed(url: impl Into<String>, error: FetchError) -> Self {
        Self {
            url: url.into(),
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn markdown(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|page| page.markdown.as_str())
    }

    pub fn origin(&self) -> Option<Origin> {
        self.result.as_ref().ok().map(|page| page.origin)
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.result.as_ref().err()
    }
}

// Why a single page could not be scraped.
//
// Stored inside outcomes and cloned into snapshots, so it keeps messages
// rather than the underlying reqwest errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed (status {0})")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("markdown conversion failed: {0}")]
    Conversion(String),
}

// Why a whole run could not start
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("no seed URLs given")]
    NoSeeds,

    #[error("parallelism must be at least 1")]
    ZeroParallelism,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// Progress notifications emitted by the engine.
//
// Delivery is fire-and-forget: the engine never waits for the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// An attempt was admitted and the request is about to be sent
    Fetching { url: String },
    /// The attempt finished; `origin` is None when the response was skipped
    /// (neither markdown nor HTML) and nothing was stored
    Done { url: String, origin: Option<Origin> },
    /// The attempt finished with an error outcome
    Error { url: String, error: FetchError },
}

impl CrawlEvent {
    pub fn url(&self) -> &str {
        match self {
            CrawlEvent::Fetching { url }
            | CrawlEvent::Done { url, .. }
            | CrawlEvent::Error { url, .. } => url,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CrawlEvent::Done { origin: None, .. })
    }
}

// Settings for one crawl run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub seeds: Vec<String>,
    /// 0 = seeds only, no link following
    pub max_depth: usize,
    /// Hard ceiling on simultaneously in-flight requests
    pub parallelism: usize,
    /// 0 = unbounded
    pub max_pages: usize,
    pub cross_domains: bool,
    pub request_timeout: Duration,
    /// Optional progress channel
    pub events: Option<UnboundedSender<CrawlEvent>>,
}

impl CrawlOptions {
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            seeds,
            max_depth: 0,
            parallelism: 10,
            max_pages: 0,
            cross_domains: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            events: None,
        }
    }

    // Sends an event if someone is listening; a closed channel is ignored
    pub(crate) fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
