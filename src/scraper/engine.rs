// src/scraper/engine.rs
// =============================================================================
// The crawl engine: seeds in, markdown documents out.
//
// How it works:
// 1. Seeds go into the frontier at depth 1
// 2. A coordinator loop keeps at most `parallelism` fetch tasks running
// 3. Each task decides whether it may start at all (cancelled? page budget
//    used up?), fetches its URL and classifies the response:
//      text/markdown -> stored as-is, links found with pulldown-cmark
//      text/html     -> converted to markdown, links found in the DOM
//                       (both on the blocking pool, off the async workers)
//      anything else -> nothing stored, a "skipped" Done event is sent
// 4. Links a task found come back to the coordinator, which enqueues the
//    ones it has not seen yet
// 5. When no task is running and nothing is pending, the results are copied
//    out of the store and returned
//
// Depth: seeds are depth 1, their links depth 2, and so on. A page may be
// fetched while its depth is <= max_depth + 1, so max_depth = 0 means seeds
// only and max_depth = 1 means one hop beyond the seeds.
//
// Shared state between tasks:
// - ResultStore (its own mutex)
// - the "started attempts" counter (an atomic, never behind the store lock)
// - the host policy (built once, read-only)
// =============================================================================

use super::convert::{HtmdConverter, MarkdownConverter};
use super::domains::HostPolicy;
use super::fetch::{self, Body};
use super::links::{extract_html_links, extract_markdown_links};
use super::store::ResultStore;
use super::types::{CrawlError, CrawlEvent, CrawlOptions, FetchError, FetchOutcome, Origin};
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

// A URL waiting to be fetched, and how many hops it is from a seed
#[derive(Debug, Clone)]
struct FrontierEntry {
    url: Url,
    depth: usize,
}

// Pending entries plus every URL ever enqueued, so nothing is fetched twice
#[derive(Debug, Default)]
struct Frontier {
    pending: VecDeque<FrontierEntry>,
    enqueued: HashSet<String>,
}

impl Frontier {
    fn push(&mut self, entry: FrontierEntry) {
        if self.enqueued.insert(entry.url.as_str().to_string()) {
            self.pending.push_back(entry);
        }
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        self.pending.pop_front()
    }
}

// Everything the fetch tasks of one run share
struct Crawl {
    options: CrawlOptions,
    client: Client,
    converter: Arc<dyn MarkdownConverter>,
    policy: HostPolicy,
    store: ResultStore,
    started: AtomicUsize,
    cancel: CancellationToken,
}

// Crawls with the default HTML -> markdown converter
pub async fn run(
    cancel: CancellationToken,
    options: CrawlOptions,
) -> Result<Vec<FetchOutcome>, CrawlError> {
    run_with_converter(cancel, options, Arc::new(HtmdConverter::new())).await
}

// Crawls the seeds in `options` and returns one outcome per fetched page,
// in completion order.
//
// Individual pages never fail the run; they show up as outcomes with an
// error. The run itself only fails when it cannot start.
pub async fn run_with_converter(
    cancel: CancellationToken,
    options: CrawlOptions,
    converter: Arc<dyn MarkdownConverter>,
) -> Result<Vec<FetchOutcome>, CrawlError> {
    if options.seeds.is_empty() {
        return Err(CrawlError::NoSeeds);
    }
    if options.parallelism == 0 {
        return Err(CrawlError::ZeroParallelism);
    }

    let client = fetch::build_client(options.request_timeout)?;
    let policy = HostPolicy::for_run(&options.seeds, options.max_depth, options.cross_domains);
    let parallelism = options.parallelism;

    let mut frontier = Frontier::default();
    for seed in &options.seeds {
        match parse_seed(seed) {
            Some(url) => frontier.push(FrontierEntry { url, depth: 1 }),
            None => debug!(seed = %seed, "skipping seed that is not an http(s) URL"),
        }
    }

    let crawl = Arc::new(Crawl {
        options,
        client,
        converter,
        policy,
        store: ResultStore::new(),
        started: AtomicUsize::new(0),
        cancel,
    });

    let mut tasks = JoinSet::new();
    loop {
        // Top the pool up to the parallelism ceiling
        while tasks.len() < parallelism && !crawl.cancel.is_cancelled() {
            let Some(entry) = frontier.pop() else {
                break;
            };
            let crawl = Arc::clone(&crawl);
            tasks.spawn(async move { crawl.visit(entry).await });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        match joined {
            Ok(discovered) => {
                if !crawl.cancel.is_cancelled() {
                    for entry in discovered {
                        frontier.push(entry);
                    }
                }
            }
            Err(err) => warn!(error = %err, "fetch task ended abnormally"),
        }
    }

    debug!(
        started = crawl.started.load(Ordering::SeqCst),
        stored = crawl.store.len(),
        "crawl finished"
    );
    Ok(crawl.store.snapshot())
}

// Seeds must be absolute http(s) URLs; the fragment is dropped
fn parse_seed(seed: &str) -> Option<Url> {
    let mut url = Url::parse(seed.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

impl Crawl {
    // One fetch attempt. Returns the links worth enqueuing.
    async fn visit(&self, entry: FrontierEntry) -> Vec<FrontierEntry> {
        let url = entry.url.as_str().to_string();

        // Admission: declined attempts leave no outcome and no event
        if self.cancel.is_cancelled() {
            debug!(%url, "not started: crawl cancelled");
            return Vec::new();
        }
        if !self.try_start() {
            debug!(%url, "not started: page budget used up");
            return Vec::new();
        }

        self.options.emit(CrawlEvent::Fetching { url: url.clone() });

        let body = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(%url, "aborted: crawl cancelled");
                return Vec::new();
            }
            body = fetch::fetch_page(&self.client, &url) => body,
        };

        // Only pages short of the depth limit have links worth reading
        let follow = entry.depth <= self.options.max_depth;

        match body {
            Err(error) => {
                self.fail(url, error);
                Vec::new()
            }
            Ok(Body::Markdown(markdown)) => {
                let links = if follow {
                    extract_markdown_links(&markdown, &url)
                } else {
                    Vec::new()
                };
                self.succeed(url, markdown, Origin::Native);
                self.admit_links(links, entry.depth)
            }
            Ok(Body::Html(html)) => {
                let converter = Arc::clone(&self.converter);
                let base = entry.url.clone();
                let parsed = task::spawn_blocking(move || -> anyhow::Result<_> {
                    let markdown = converter.convert(&html, &base)?;
                    let links = if follow {
                        extract_html_links(&html, base.as_str())
                    } else {
                        Vec::new()
                    };
                    Ok((markdown, links))
                })
                .await;

                match parsed {
                    Ok(Ok((markdown, links))) => {
                        self.succeed(url, markdown, Origin::Converted);
                        self.admit_links(links, entry.depth)
                    }
                    Ok(Err(err)) => {
                        self.fail(url, FetchError::Conversion(format!("{err:#}")));
                        Vec::new()
                    }
                    Err(err) => {
                        self.fail(url, FetchError::Conversion(err.to_string()));
                        Vec::new()
                    }
                }
            }
            Ok(Body::Other) => {
                debug!(%url, "skipped: neither markdown nor HTML");
                self.options.emit(CrawlEvent::Done { url, origin: None });
                Vec::new()
            }
        }
    }

    // Counts a started attempt, refusing once max_pages attempts started.
    //
    // The check and the increment are one atomic step, so concurrent tasks
    // can never start more than max_pages fetches between them.
    fn try_start(&self) -> bool {
        let max = self.options.max_pages;
        if max == 0 {
            self.started.fetch_add(1, Ordering::SeqCst);
            return true;
        }
        self.started
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }

    fn succeed(&self, url: String, markdown: String, origin: Origin) {
        self.store.add(FetchOutcome::page(url.clone(), markdown, origin));
        self.options.emit(CrawlEvent::Done {
            url,
            origin: Some(origin),
        });
    }

    fn fail(&self, url: String, error: FetchError) {
        debug!(%url, %error, "fetch failed");
        self.store.add(FetchOutcome::failed(url.clone(), error.clone()));
        self.options.emit(CrawlEvent::Error { url, error });
    }

    // Turns raw links from a page at `depth` into frontier entries, keeping
    // only those within the depth limit and the host policy
    fn admit_links(&self, links: Vec<String>, depth: usize) -> Vec<FrontierEntry> {
        let next = depth + 1;
        if next > self.options.max_depth + 1 {
            return Vec::new();
        }

        links
            .into_iter()
            .filter_map(|link| Url::parse(&link).ok())
            .filter(|url| {
                let allowed = self.policy.allows(url);
                if !allowed {
                    debug!(url = %url, "not following: host outside the seed domains");
                }
                allowed
            })
            .map(|url| FrontierEntry { url, depth: next })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn markdown(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_raw(body, "text/markdown; charset=utf-8")
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_raw(body, "text/html; charset=utf-8")
    }

    async fn serve(server: &MockServer, at: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn serve_never(server: &MockServer, at: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(markdown("should not be fetched"))
            .expect(0)
            .mount(server)
            .await;
    }

    // Runs a crawl and returns its outcomes together with every event sent
    async fn crawl(options: CrawlOptions) -> (Vec<FetchOutcome>, Vec<CrawlEvent>) {
        crawl_with(options, Arc::new(HtmdConverter::new())).await
    }

    async fn crawl_with(
        mut options: CrawlOptions,
        converter: Arc<dyn MarkdownConverter>,
    ) -> (Vec<FetchOutcome>, Vec<CrawlEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        options.events = Some(tx);
        let results = run_with_converter(CancellationToken::new(), options, converter)
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (results, events)
    }

    fn urls(results: &[FetchOutcome]) -> HashSet<String> {
        results.iter().map(|o| o.url.clone()).collect()
    }

    fn options(seed: String, max_depth: usize) -> CrawlOptions {
        let mut options = CrawlOptions::new(vec![seed]);
        options.max_depth = max_depth;
        options.request_timeout = Duration::from_secs(5);
        options
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_seeds_only() {
        let server = MockServer::start().await;
        serve(&server, "/", markdown("[b](/b)")).await;
        serve_never(&server, "/b").await;

        let (results, _) = crawl(options(format!("{}/", server.uri()), 0)).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, format!("{}/", server.uri()));
        assert_eq!(results[0].origin(), Some(Origin::Native));
        assert_eq!(results[0].markdown(), Some("[b](/b)"));
    }

    #[tokio::test]
    async fn test_depth_one_follows_exactly_one_hop() {
        let server = MockServer::start().await;
        serve(&server, "/", markdown("[b](/b)")).await;
        serve(&server, "/b", html(r#"<p><a href="/c">c</a></p>"#)).await;
        serve_never(&server, "/c").await;

        let (results, _) = crawl(options(format!("{}/", server.uri()), 1)).await;

        let base = server.uri();
        assert_eq!(
            urls(&results),
            HashSet::from([format!("{base}/"), format!("{base}/b")])
        );
        assert!(results.iter().all(FetchOutcome::is_ok));
        let b = results.iter().find(|o| o.url.ends_with("/b")).unwrap();
        assert_eq!(b.origin(), Some(Origin::Converted));
    }

    #[tokio::test]
    async fn test_depth_two_follows_html_links() {
        let server = MockServer::start().await;
        serve(&server, "/", html(r#"<a href="/b#section">b</a>"#)).await;
        serve(&server, "/b", markdown("[c](c)")).await;
        serve(&server, "/c", markdown("end")).await;

        let (results, _) = crawl(options(format!("{}/", server.uri()), 2)).await;

        let base = server.uri();
        assert_eq!(
            urls(&results),
            HashSet::from([format!("{base}/"), format!("{base}/b"), format!("{base}/c")])
        );
    }

    #[tokio::test]
    async fn test_each_url_fetched_once() {
        let server = MockServer::start().await;
        serve(&server, "/", markdown("[b](/b) [again](/b#x) [self](/)")).await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(markdown("[home](/) [me](/b)"))
            .expect(1)
            .mount(&server)
            .await;

        let (results, _) = crawl(options(format!("{}/", server.uri()), 3)).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_other_domains_not_followed() {
        let server = MockServer::start().await;
        let port = server.address().port();
        // Same server, reached through a different host name
        let foreign = format!("http://localhost:{port}/foreign");
        serve(&server, "/", markdown(&format!("[out]({foreign}) [in](/in)"))).await;
        serve(&server, "/in", markdown("inside")).await;
        serve_never(&server, "/foreign").await;

        let seed = format!("http://127.0.0.1:{port}/");
        let (results, _) = crawl(options(seed.clone(), 1)).await;

        assert_eq!(
            urls(&results),
            HashSet::from([seed, format!("http://127.0.0.1:{port}/in")])
        );
    }

    #[tokio::test]
    async fn test_max_pages_caps_started_attempts() {
        let server = MockServer::start().await;
        let links: String = (0..20).map(|i| format!("[p{i}](/p{i})\n")).collect();
        serve(&server, "/", markdown(&links)).await;
        for i in 0..20 {
            serve(&server, &format!("/p{i}"), markdown("leaf")).await;
        }

        let mut opts = options(format!("{}/", server.uri()), 1);
        opts.parallelism = 50;
        opts.max_pages = 3;
        let (results, events) = crawl(opts).await;

        let started = events
            .iter()
            .filter(|e| matches!(e, CrawlEvent::Fetching { .. }))
            .count();
        assert_eq!(started, 3);
        assert!(results.len() <= 3);
        let requests = server.received_requests().await.unwrap();
        assert!(requests.len() <= 3, "{} requests sent", requests.len());
    }

    #[tokio::test]
    async fn test_parallelism_is_a_ceiling() {
        let server = MockServer::start().await;
        let links: String = (0..10).map(|i| format!("[p{i}](/p{i})\n")).collect();
        serve(&server, "/", markdown(&links)).await;
        for i in 0..10 {
            let slow = markdown("leaf").set_delay(Duration::from_millis(200));
            serve(&server, &format!("/p{i}"), slow).await;
        }

        let mut opts = options(format!("{}/", server.uri()), 1);
        opts.parallelism = 2;
        let started = Instant::now();
        let (results, _) = crawl(opts).await;

        assert_eq!(results.len(), 11);
        // 10 slow pages, two at a time: at least five rounds of 200ms
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_server_error_becomes_outcome() {
        let server = MockServer::start().await;
        serve(&server, "/", ResponseTemplate::new(500)).await;

        let (results, events) = crawl(options(format!("{}/", server.uri()), 0)).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error(), Some(&FetchError::Status(500)));
        assert_eq!(results[0].markdown(), None);
        assert!(events
            .iter()
            .any(|e| matches!(e, CrawlEvent::Error { error: FetchError::Status(500), .. })));
    }

    #[tokio::test]
    async fn test_non_document_is_skipped() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/logo.png",
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]),
        )
        .await;

        let seed = format!("{}/logo.png", server.uri());
        let (results, events) = crawl(options(seed.clone(), 0)).await;

        assert!(results.is_empty());
        assert_eq!(
            events,
            vec![
                CrawlEvent::Fetching { url: seed.clone() },
                CrawlEvent::Done {
                    url: seed,
                    origin: None
                },
            ]
        );
    }

    struct FailingConverter;

    impl MarkdownConverter for FailingConverter {
        fn convert(&self, _html: &str, _base_url: &Url) -> anyhow::Result<String> {
            Err(anyhow!("broken document"))
        }
    }

    #[tokio::test]
    async fn test_conversion_failure_stops_the_page() {
        let server = MockServer::start().await;
        serve(&server, "/", html(r#"<a href="/b">b</a>"#)).await;
        serve_never(&server, "/b").await;

        let (results, events) =
            crawl_with(options(format!("{}/", server.uri()), 1), Arc::new(FailingConverter)).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].error(), Some(FetchError::Conversion(_))));
        assert!(events.iter().any(|e| matches!(e, CrawlEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        serve_never(&server, "/").await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut opts = options(format!("{}/", server.uri()), 0);
        opts.events = Some(tx);

        let results = run(cancel, opts).await.unwrap();
        assert!(results.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_returns_promptly() {
        let server = MockServer::start().await;
        serve(&server, "/", markdown("[slow](/slow)")).await;
        serve(
            &server,
            "/slow",
            markdown("late").set_delay(Duration::from_secs(3)),
        )
        .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut opts = options(format!("{}/", server.uri()), 1);
        opts.events = Some(tx);

        let started = Instant::now();
        let results = run(cancel, opts).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        // The seed completed before cancellation and stays valid
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());

        // The cut-short attempt announced itself but never finished
        let slow = format!("{}/slow", server.uri());
        let mut slow_events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.url() == slow {
                slow_events.push(event);
            }
        }
        assert_eq!(slow_events, vec![CrawlEvent::Fetching { url: slow }]);
    }

    #[tokio::test]
    async fn test_depth_zero_html_seed_links_not_followed() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/",
            html(r#"<p><a href="/b">b</a> <a href="c.html">c</a></p>"#),
        )
        .await;
        serve_never(&server, "/b").await;
        serve_never(&server, "/c.html").await;

        let (results, events) = crawl(options(format!("{}/", server.uri()), 0)).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].origin(), Some(Origin::Converted));
        let started = events
            .iter()
            .filter(|e| matches!(e, CrawlEvent::Fetching { .. }))
            .count();
        assert_eq!(started, 1);
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let empty = CrawlOptions::new(Vec::new());
        assert!(matches!(
            run(CancellationToken::new(), empty).await,
            Err(CrawlError::NoSeeds)
        ));

        let mut zero = CrawlOptions::new(vec!["https://a.test/".to_string()]);
        zero.parallelism = 0;
        assert!(matches!(
            run(CancellationToken::new(), zero).await,
            Err(CrawlError::ZeroParallelism)
        ));
    }

    #[tokio::test]
    async fn test_unusable_seeds_are_skipped() {
        let server = MockServer::start().await;
        serve(&server, "/", markdown("ok")).await;

        let mut opts = options(format!("{}/#top", server.uri()), 0);
        opts.seeds.push("not a url".to_string());
        opts.seeds.push("ftp://files.a.test/".to_string());
        let (results, _) = crawl(opts).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, format!("{}/", server.uri()));
    }

    #[test]
    fn test_frontier_deduplicates() {
        let mut frontier = Frontier::default();
        let url = Url::parse("https://a.test/").unwrap();
        frontier.push(FrontierEntry { url: url.clone(), depth: 1 });
        frontier.push(FrontierEntry { url, depth: 2 });

        assert_eq!(frontier.pop().map(|e| e.depth), Some(1));
        assert!(frontier.pop().is_none());
    }
}
