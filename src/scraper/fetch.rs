// src/scraper/fetch.rs
// =============================================================================
// This module makes the HTTP requests for the crawl engine.
//
// Key functionality:
// - One shared reqwest Client (connection pooling) with a fixed timeout
// - Every request asks for markdown first: "Accept: text/markdown"
// - Responses are classified by Content-Type into markdown / HTML / other
// - reqwest errors are mapped onto FetchError variants (timeout, connect...)
//
// Rust concepts:
// - async/await: network I/O without blocking other fetches
// - Enums: the three kinds of body we care about
// =============================================================================

use super::types::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("scraped/", env!("CARGO_PKG_VERSION"));

// What a successful response contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// text/markdown, used as-is
    Markdown(String),
    /// text/html, needs conversion
    Html(String),
    /// Anything else (images, scripts, stylesheets...), body not read
    Other,
}

// Builds the HTTP client shared by every fetch of a run
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/markdown"));

    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

// Fetches one URL and classifies its body
//
// Returns:
//   Ok(Body) for any 2xx response
//   Err(FetchError) for non-2xx statuses and transport failures
pub async fn fetch_page(client: &Client, url: &str) -> Result<Body, FetchError> {
    let response = client.get(url).send().await.map_err(categorize_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    // Markdown wins if a server sends something odd like "text/markdown; text/html"
    if content_type.contains("text/markdown") {
        let text = response.text().await.map_err(categorize_error)?;
        Ok(Body::Markdown(text))
    } else if content_type.contains("text/html") {
        let text = response.text().await.map_err(categorize_error)?;
        Ok(Body::Html(text))
    } else {
        Ok(Body::Other)
    }
}

// Maps a reqwest error onto a FetchError
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution / connection failure
// - Too many redirects
// - Anything else (TLS, malformed response, body read failure...)
fn categorize_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::TooManyRedirects
    } else if error.is_connect() {
        FetchError::Connect(error.to_string())
    } else if let Some(status) = error.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Transport(error.to_string())
    }
}
