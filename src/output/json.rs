// src/output/json.rs
// =============================================================================
// JSON output: one record per outcome, in completion order.
//
//   [
//     { "url": "https://a.test/", "source": "native", "markdown": "# A" },
//     { "url": "https://a.test/x", "error": "request failed (status 404)" }
//   ]
// =============================================================================

use crate::scraper::{FetchOutcome, Origin};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OutcomeRecord<'a> {
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> From<&'a FetchOutcome> for OutcomeRecord<'a> {
    fn from(outcome: &'a FetchOutcome) -> Self {
        Self {
            url: &outcome.url,
            source: outcome.origin(),
            markdown: outcome.markdown(),
            error: outcome.error().map(ToString::to_string),
        }
    }
}

pub fn to_json(results: &[FetchOutcome]) -> Result<String> {
    let records: Vec<OutcomeRecord<'_>> = results.iter().map(OutcomeRecord::from).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}
