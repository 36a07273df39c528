// src/scraper/links.rs
// =============================================================================
// This module finds the links a page points to.
//
// Two flavours of page:
// - Native markdown: parsed with `pulldown-cmark`, every inline link,
//   reference link and autolink is collected
// - HTML: parsed with `scraper`, every <a href> is collected
//
// Both go through the same resolution rule (resolve_link):
// 1. Skip empty hrefs, in-page anchors (#...) and mailto: links
// 2. Resolve against the page address (relative -> absolute)
// 3. Drop the #fragment
// 4. Keep only http/https
//
// Results keep document order and may contain duplicates; dropping
// repeats is the crawl engine's job.
// =============================================================================

use pulldown_cmark::{Event, LinkType, Parser, Tag};
use scraper::{Html, Selector};
use url::Url;

// Extracts all followable links from a markdown document
//
// Parameters:
//   markdown: the markdown body
//   base_url: the address the markdown was fetched from
//
// Example:
//   markdown = "See [docs](/docs#intro) and <https://other.test>"
//   base_url = "https://a.test/page"
//   result   = ["https://a.test/docs", "https://other.test/"]
pub fn extract_markdown_links(markdown: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };

    // A parser is cheap to build, so one per document is fine
    Parser::new(markdown)
        .filter_map(|event| match event {
            // Email autolinks (<someone@example.com>) carry no scheme at all
            Event::Start(Tag::Link(LinkType::Email, _, _)) => None,
            Event::Start(Tag::Link(_, dest, _)) => resolve_link(&base, &dest),
            _ => None,
        })
        .map(String::from)
        .collect()
}

// Extracts all followable links from an HTML document
//
// A <base href> element, when present, replaces the page address as the
// base for relative links, the same way a browser treats it.
pub fn extract_html_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(page_url) = Url::parse(base_url) else {
        return Vec::new();
    };
    let (Ok(anchors), Ok(base_tag)) = (Selector::parse("a[href]"), Selector::parse("base[href]"))
    else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    let base = document
        .select(&base_tag)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or(page_url);

    document
        .select(&anchors)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(&base, href))
        .map(String::from)
        .collect()
}

// Resolves an href to an absolute, fragment-free http(s) URL
//
// Returns None for anything that should not be crawled:
//   ""                        -> None
//   "#section"                -> None
//   "mailto:me@example.com"   -> None
//   "javascript:void(0)"      -> None (not http/https)
//   "/docs#top"               -> Some("https://<base host>/docs")
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("mailto:") {
        return None;
    }

    // join() handles both absolute and relative hrefs
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);

    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Url::join instead of string concatenation?
//    - join() follows the URL standard: "../x", "//host/x", "?q=1" and
//      absolute URLs all resolve exactly like a browser would resolve them
//
// 2. Why filter_map?
//    - It maps and filters in one step: None values are dropped
//    - resolve_link returns Option<Url>, which fits filter_map directly
//
// 3. What does LinkType tell us?
//    - pulldown-cmark reports how a link was written: inline [a](b),
//      reference [a][ref], autolink <https://...>, email <a@b.c>, ...
//    - Only the email flavour is dropped; all others are real targets
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://a.test/guide/page";

    #[test]
    fn test_markdown_inline_and_relative() {
        let markdown = "Read [intro](intro) and [root](/docs) and [abs](https://b.test/x).";
        let links = extract_markdown_links(markdown, BASE);
        assert_eq!(
            links,
            vec![
                "https://a.test/guide/intro",
                "https://a.test/docs",
                "https://b.test/x",
            ]
        );
    }

    #[test]
    fn test_markdown_reference_and_autolinks() {
        let markdown = "\
See [the docs][ref] or <https://c.test/auto>.

[ref]: https://a.test/reference
";
        let links = extract_markdown_links(markdown, BASE);
        assert_eq!(
            links,
            vec!["https://a.test/reference", "https://c.test/auto"]
        );
    }

    #[test]
    fn test_markdown_strips_fragments_and_keeps_duplicates() {
        let markdown = "[a](/x#one) [b](/x#two)";
        let links = extract_markdown_links(markdown, BASE);
        assert_eq!(links, vec!["https://a.test/x", "https://a.test/x"]);
    }

    #[test]
    fn test_markdown_skips_unfollowable() {
        let markdown = "\
[anchor](#top) [mail](mailto:me@a.test) <me@a.test>
[ftp](ftp://files.a.test/f) [js](javascript:void(0)) ![img](/logo.png)
";
        let links = extract_markdown_links(markdown, BASE);
        assert!(links.is_empty(), "got {links:?}");
    }

    #[test]
    fn test_markdown_bad_base() {
        assert!(extract_markdown_links("[x](/y)", "not a url").is_empty());
    }

    #[test]
    fn test_html_links() {
        let html = r##"
            <a href="/docs#part">Docs</a>
            <a href="https://b.test">B</a>
            <a href="#top">Top</a>
            <a href="mailto:me@a.test">Mail</a>
            <a>No href</a>
        "##;
        let links = extract_html_links(html, BASE);
        assert_eq!(links, vec!["https://a.test/docs", "https://b.test/"]);
    }

    #[test]
    fn test_html_honors_base_tag() {
        let html = r#"
            <html><head><base href="https://cdn.a.test/root/"></head>
            <body><a href="page">Page</a></body></html>
        "#;
        let links = extract_html_links(html, BASE);
        assert_eq!(links, vec!["https://cdn.a.test/root/page"]);
    }

    #[test]
    fn test_resolve_link_rules() {
        let base = Url::parse(BASE).unwrap();
        assert_eq!(resolve_link(&base, "   "), None);
        assert_eq!(
            resolve_link(&base, " ../up ").map(String::from),
            Some("https://a.test/up".to_string())
        );
        assert_eq!(
            resolve_link(&base, "//d.test/x").map(String::from),
            Some("https://d.test/x".to_string())
        );
    }
}
