// src/scraper/domains.rs
// =============================================================================
// Decides which hosts a crawl may follow links into.
//
// The allowed set is built once from the seed URLs:
// - each seed's host
// - plus its "www." twin ("www.example.com" <-> "example.com")
//
// Links found later never widen the set. Seeds themselves are always
// fetched; the policy only filters discovered links.
// =============================================================================

use std::collections::HashSet;
use url::Url;

// Collects the hosts of the seeds and their www./bare counterparts.
// Seeds that do not parse or have no host are ignored.
pub fn allowed_hosts<S: AsRef<str>>(seeds: &[S]) -> HashSet<String> {
    let mut hosts = HashSet::new();

    for seed in seeds {
        let Ok(url) = Url::parse(seed.as_ref()) else {
            continue;
        };
        let Some(host) = url.host_str().filter(|h| !h.is_empty()) else {
            continue;
        };

        let twin = match host.strip_prefix("www.") {
            Some(bare) => bare.to_string(),
            None => format!("www.{host}"),
        };
        hosts.insert(host.to_string());
        hosts.insert(twin);
    }

    hosts
}

// The link filter for one run
#[derive(Debug, Clone, Default)]
pub enum HostPolicy {
    /// Follow links to any host
    #[default]
    Any,
    /// Follow links only to these hosts
    Only(HashSet<String>),
}

impl HostPolicy {
    // Builds the policy for a run.
    //
    // Restriction only applies when links are followed at all and
    // cross-domain crawling is off. If no host could be derived from the
    // seeds there is nothing to restrict to, so every host is allowed.
    pub fn for_run<S: AsRef<str>>(seeds: &[S], max_depth: usize, cross_domains: bool) -> Self {
        if max_depth == 0 || cross_domains {
            return HostPolicy::Any;
        }
        let hosts = allowed_hosts(seeds);
        if hosts.is_empty() {
            HostPolicy::Any
        } else {
            HostPolicy::Only(hosts)
        }
    }

    pub fn allows(&self, url: &Url) -> bool {
        match self {
            HostPolicy::Any => true,
            HostPolicy::Only(hosts) => url.host_str().is_some_and(|host| hosts.contains(host)),
        }
    }
}
