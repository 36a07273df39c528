// src/output/files.rs
// =============================================================================
// Writes every successfully scraped page to its own .md file.
//
// File names come from the URL: host + path, slashes turned into dashes.
//   https://example.com/docs/intro -> example.com-docs-intro.md
//   https://example.com/           -> example.com.md
//
// Files are written concurrently (a handful at a time) with tokio::fs.
// Failed pages and files that cannot be written are reported and skipped;
// only a directory that cannot be created fails the whole step.
// =============================================================================

use crate::scraper::FetchOutcome;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

// How many files are written at the same time
const WRITE_CONCURRENCY: usize = 8;

// Writes all successful outcomes into `dir` and returns the paths written
pub async fn write_files(results: &[FetchOutcome], dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let writes = results.iter().filter_map(|outcome| match &outcome.result {
        Ok(page) => {
            let path = dir.join(url_to_filename(&outcome.url));
            Some(async move {
                match tokio::fs::write(&path, page.markdown.as_bytes()).await {
                    Ok(()) => Some(path),
                    Err(error) => {
                        warn!(path = %path.display(), %error, "could not write file");
                        None
                    }
                }
            })
        }
        Err(error) => {
            warn!(url = %outcome.url, %error, "not saved: scrape failed");
            None
        }
    });

    let written: Vec<PathBuf> = stream::iter(writes)
        .buffer_unordered(WRITE_CONCURRENCY)
        .filter_map(|path| async move { path })
        .collect()
        .await;

    for path in &written {
        info!(path = %path.display(), "saved");
    }
    Ok(written)
}

// Converts a URL into a safe file name
pub fn url_to_filename(raw_url: &str) -> String {
    let Ok(url) = Url::parse(raw_url) else {
        return "unknown.md".to_string();
    };

    let host = url.host_str().unwrap_or("");
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let name = format!("{host}{port}{}", url.path())
        .replace(['/', '\\', ':'], "-");
    let name = name.trim_matches('-');

    if name.is_empty() {
        "index.md".to_string()
    } else {
        format!("{name}.md")
    }
}
