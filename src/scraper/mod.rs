// src/scraper/mod.rs
// =============================================================================
// The crawl core: fetch seed URLs, follow links, collect markdown.
//
// Submodules:
// - types:   outcomes, options, events and errors
// - store:   thread-safe, de-duplicated result collection
// - domains: which hosts links may be followed into
// - links:   link discovery in markdown and HTML pages
// - fetch:   HTTP requests and response classification
// - convert: HTML -> markdown conversion
// - engine:  the concurrent crawl itself
//
// Nothing in here prints; progress goes out through CrawlEvent and results
// are returned to the caller.
// =============================================================================

mod convert;
mod domains;
mod engine;
mod fetch;
mod links;
mod store;
mod types;

pub use engine::run;
pub use types::{CrawlEvent, CrawlOptions, FetchError, FetchOutcome, Origin};
