// src/scraper/convert.rs
// =============================================================================
// HTML -> markdown conversion.
//
// The engine only talks to the MarkdownConverter trait, so tests (or other
// backends) can plug in their own conversion. The default implementation
// uses the `htmd` crate and then rewrites relative link and image targets
// to absolute URLs, using the page address as the base. Without that step a
// converted page would be full of "/docs"-style links that point nowhere
// once the markdown leaves the site.
// =============================================================================

use anyhow::{Context, Result};
use htmd::HtmlToMarkdown;
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};
use std::borrow::Cow;
use std::ops::Range;
use url::Url;

pub trait MarkdownConverter: Send + Sync {
    /// Converts an HTML document fetched from `base_url` into markdown.
    fn convert(&self, html: &str, base_url: &Url) -> Result<String>;
}

// Default converter backed by htmd.
//
// A fresh htmd converter is built per document; building one is cheap and
// it keeps HtmdConverter trivially shareable between fetch tasks.
pub struct HtmdConverter {
    skip_tags: Vec<&'static str>,
}

impl HtmdConverter {
    pub fn new() -> Self {
        Self {
            skip_tags: vec!["script", "style", "noscript", "template"],
        }
    }
}

impl Default for HtmdConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter for HtmdConverter {
    fn convert(&self, html: &str, base_url: &Url) -> Result<String> {
        let markdown = HtmlToMarkdown::builder()
            .skip_tags(self.skip_tags.clone())
            .build()
            .convert(html)
            .context("htmd could not convert the document")?;
        Ok(absolutize_links(&markdown, base_url))
    }
}

// Rewrites relative link and image destinations into absolute URLs.
//
// Only real destinations are touched: pulldown-cmark finds the links, so
// text inside code blocks and code spans that merely looks like `](x)` is
// left as written. Absolute targets, in-page anchors, autolinks and
// reference-style links keep their original text.
pub fn absolutize_links(markdown: &str, base: &Url) -> String {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for (event, range) in Parser::new_ext(markdown, Options::all()).into_offset_iter() {
        let (Event::Start(Tag::Link(kind, dest, _)) | Event::Start(Tag::Image(kind, dest, _))) =
            event
        else {
            continue;
        };
        if !matches!(kind, LinkType::Inline) {
            continue;
        }
        let Cow::Owned(absolute) = absolute_target(&dest, base) else {
            continue;
        };
        if let Some(span) = destination_span(&markdown[range.clone()], &dest) {
            edits.push((range.start + span.start..range.start + span.end, absolute));
        }
    }

    // A link wrapping an image yields two disjoint spans; order them by offset
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for (span, absolute) in edits {
        if span.start < cursor {
            continue;
        }
        out.push_str(&markdown[cursor..span.start]);
        out.push_str(&absolute);
        cursor = span.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

// Where `dest` sits inside the source text of one inline link.
//
// The destination follows the last `](` of the link, optionally inside <...>.
// Returns None when the source spells it differently (escapes, entities).
fn destination_span(link: &str, dest: &str) -> Option<Range<usize>> {
    let open = link.rfind("](")? + 2;
    let rest = &link[open..];
    let mut start = open + (rest.len() - rest.trim_start().len());
    if link[start..].starts_with('<') {
        start += 1;
    }
    link[start..]
        .starts_with(dest)
        .then(|| start..start + dest.len())
}

fn absolute_target<'a>(target: &'a str, base: &Url) -> Cow<'a, str> {
    let keep = target.is_empty() || target.starts_with('#') || Url::parse(target).is_ok();
    if keep {
        return Cow::Borrowed(target);
    }

    match base.join(target) {
        Ok(url) => Cow::Owned(url.into()),
        Err(_) => Cow::Borrowed(target),
    }
}
